//! Configuration management
//!
//! Two inputs feed the pipeline: the camera list (YAML, one section per
//! camera) and the pipeline settings (TOML, every field defaulted).

pub mod cameras;
pub mod settings;

use std::path::PathBuf;
use thiserror::Error;

pub use cameras::{is_live_uri, Camera, CameraList};
pub use settings::{
    Codec, DecoderStrategy, DisplaySettings, InferenceSettings, MuxerSettings, OutputSettings,
    PipelineSettings, SourceSettings,
};

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    FileReadError(PathBuf, std::io::Error),

    #[error("Failed to write config file {0}: {1}")]
    FileWriteError(PathBuf, std::io::Error),

    #[error("Config parse error: {0}")]
    ParseError(String),

    #[error("Config serialize error: {0}")]
    SerializeError(String),

    #[error("Missing config section: {0}")]
    MissingSection(String),

    #[error("Missing config field: {0}")]
    MissingField(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
