//! Multi-camera analytics pipeline binary

use anyhow::{bail, Context, Result};
use clap::Parser;
use gstmulticam::config::{CameraList, Codec, DecoderStrategy, PipelineSettings};
use gstmulticam::host::memory::MemoryHost;
use gstmulticam::{assemble, VERSION};
use std::path::PathBuf;
use tracing::{error, info};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Output codec
    #[arg(short, long, value_enum)]
    codec: Option<Codec>,

    /// Output bitrate in bits per second
    #[arg(short, long)]
    bitrate: Option<u32>,

    /// Camera list
    #[arg(long, default_value = "config/main_config.yaml")]
    cameras: PathBuf,

    /// Pipeline settings (TOML)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Decoding element used for each camera
    #[arg(long, value_enum)]
    decoder: Option<DecoderStrategy>,

    /// Fail a camera whose decoder does not output accelerated memory
    #[arg(long)]
    strict_memory: bool,

    /// Drop the secondary inference stage
    #[arg(long)]
    no_secondary: bool,

    /// Assemble against the in-memory host and print the graph
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_settings(args: &Args) -> Result<PipelineSettings> {
    let mut settings = match &args.settings {
        Some(path) => PipelineSettings::from_toml_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => PipelineSettings::default(),
    };

    if let Some(codec) = args.codec {
        settings.output.codec = codec;
    }
    if let Some(bitrate) = args.bitrate {
        settings.output.bitrate = bitrate;
    }
    if let Some(decoder) = args.decoder {
        settings.source.decoder = decoder;
    }
    if args.strict_memory {
        settings.source.strict_memory = true;
    }
    if args.no_secondary {
        settings.inference.secondary_enabled = false;
    }

    settings.validate().context("Invalid pipeline settings")?;
    Ok(settings)
}

#[cfg(feature = "gst")]
fn run_pipeline(cameras: &CameraList, settings: &PipelineSettings) -> Result<()> {
    use gstmulticam::host::gst::GstHost;
    use gstmulticam::lifecycle::{install_interrupt_handler, launch, RunOutcome};

    let host = GstHost::new().context("Failed to initialize GStreamer")?;
    let shutdown = install_interrupt_handler()?;

    let (outcome, snapshot) =
        launch(&host, cameras, settings, &shutdown).context("Pipeline failed")?;
    info!(
        "Processed {} batches, {} frames, {} objects",
        snapshot.batches, snapshot.frames, snapshot.objects
    );

    if let RunOutcome::PipelineError(msg) = outcome {
        bail!("Pipeline stopped with an error: {}", msg);
    }
    Ok(())
}

#[cfg(not(feature = "gst"))]
fn run_pipeline(_cameras: &CameraList, _settings: &PipelineSettings) -> Result<()> {
    bail!("Built without GStreamer support; only --dry-run is available")
}

fn run(args: &Args) -> Result<()> {
    let settings = load_settings(args)?;
    info!(
        "Codec: {}, bitrate: {}",
        settings.output.codec, settings.output.bitrate
    );

    let cameras = CameraList::from_yaml_file(&args.cameras)
        .with_context(|| format!("Failed to load cameras from {}", args.cameras.display()))?;
    for camera in &cameras {
        info!("{}", camera);
    }

    if args.dry_run {
        let host = MemoryHost::new();
        assemble(&host, &cameras, &settings).context("Failed to assemble pipeline")?;
        println!("{}", serde_json::to_string_pretty(&host.describe())?);
        return Ok(());
    }

    run_pipeline(&cameras, &settings)
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    info!("gstmulticam {}", VERSION);
    if let Err(e) = run(&args) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
