//! Configuration tests
//! Camera YAML loading and TOML pipeline settings from disk

use gstmulticam::config::{
    CameraList, Codec, ConfigError, DecoderStrategy, PipelineSettings,
};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn write_temp(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn camera_yaml(uris: &[&str]) -> String {
    let mut content = format!("%YAML:1.0\nMain:\n  iCamNum: {}\n", uris.len());
    for (i, uri) in uris.iter().enumerate() {
        content.push_str(&format!("Cam{}:\n  sURI: {}\n", i + 1, uri));
    }
    content
}

#[test]
fn test_camera_list_preserves_declared_order() {
    for n in 1..=5 {
        let uris: Vec<String> = (0..n).map(|i| format!("rtsp://cam{}/stream", i)).collect();
        let refs: Vec<&str> = uris.iter().map(String::as_str).collect();
        let file = write_temp(&camera_yaml(&refs));

        let cameras = CameraList::from_yaml_file(file.path()).unwrap();
        assert_eq!(cameras.len(), n);
        let loaded: Vec<&str> = cameras.iter().map(|c| c.uri.as_str()).collect();
        assert_eq!(loaded, refs);
    }
}

#[test]
fn test_missing_camera_uri_fails() {
    let content = "%YAML:1.0\nMain:\n  iCamNum: 3\nCam1:\n  sURI: rtsp://a\nCam2:\n  sURI: rtsp://b\n";
    let file = write_temp(content);

    let err = CameraList::from_yaml_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingSection(ref tag) if tag == "Cam3"));
}

#[test]
fn test_extra_camera_sections_ignored() {
    let mut content = camera_yaml(&["file:///a.mp4"]);
    content.push_str("Cam2:\n  sURI: file:///b.mp4\n");
    let file = write_temp(&content);

    let cameras = CameraList::from_yaml_file(file.path()).unwrap();
    assert_eq!(cameras.len(), 1);
}

#[test]
fn test_missing_camera_file() {
    let err = CameraList::from_yaml_file("/nonexistent/main_config.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::FileReadError(..)));
}

#[test]
fn test_liveness_per_camera() {
    let cameras = CameraList::from_uris(["rtsp://cam/stream", "file:///a.mp4"]);
    let live: Vec<bool> = cameras.iter().map(|c| c.is_live()).collect();
    assert_eq!(live, [true, false]);
    assert!(cameras.any_live());
}

#[test]
fn test_settings_file() {
    let content = r#"
[muxer]
width = 1280
height = 720

[source]
decoder = "uridecodebin"
strict_memory = true

[inference]
secondary_enabled = false

[output]
codec = "H265"
bitrate = 4000000
"#;
    let file = write_temp(content);
    let settings = PipelineSettings::from_toml_file(file.path()).unwrap();

    assert_eq!(settings.muxer.width, 1280);
    assert_eq!(settings.muxer.batched_push_timeout, 4_000_000);
    assert_eq!(settings.source.decoder, DecoderStrategy::UriDecodeBin);
    assert!(settings.source.strict_memory);
    assert!(settings.inference.secondary().is_none());
    assert_eq!(settings.output.codec, Codec::H265);
    assert_eq!(settings.output.bitrate, 4_000_000);
}

#[test]
fn test_invalid_settings_file() {
    let file = write_temp("[output]\nbitrate = 0\n");
    let err = PipelineSettings::from_toml_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidValue(_)));

    let file = write_temp("[muxer\nwidth = ");
    let err = PipelineSettings::from_toml_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}

#[test]
fn test_bundled_config_files() {
    let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("config");

    let cameras = CameraList::from_yaml_file(root.join("main_config.yaml")).unwrap();
    assert!(!cameras.is_empty());

    let settings = PipelineSettings::from_toml_file(root.join("pipeline.toml")).unwrap();
    assert_eq!(settings, PipelineSettings::default());
}
