use std::env;

fn main() {
    println!("cargo:rerun-if-env-changed=DEEPSTREAM_DIR");

    // Only the metadata reader links against the DeepStream SDK
    if env::var_os("CARGO_FEATURE_DEEPSTREAM").is_none() {
        return;
    }

    let root = env::var("DEEPSTREAM_DIR")
        .unwrap_or_else(|_| "/opt/nvidia/deepstream/deepstream".to_string());

    println!("cargo:rustc-link-search=native={}/lib", root);
    println!("cargo:rustc-link-lib=dylib=nvdsgst_meta");
    println!("cargo:rustc-link-lib=dylib=nvds_meta");
}
