//! Pipeline settings
//!
//! Everything here has a default matching the reference deployment, so a
//! settings file only needs the keys it changes.

use super::ConfigError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// How each camera's decoding unit is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DecoderStrategy {
    /// URI-aware accelerated source (`nvurisrcbin`)
    #[default]
    #[value(name = "nvurisrcbin")]
    NvUriSrcBin,
    /// Generic decode bin (`uridecodebin`)
    #[value(name = "uridecodebin")]
    UriDecodeBin,
}

impl DecoderStrategy {
    pub fn factory(&self) -> &'static str {
        match self {
            DecoderStrategy::NvUriSrcBin => "nvurisrcbin",
            DecoderStrategy::UriDecodeBin => "uridecodebin",
        }
    }
}

/// Output codec requested on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum Codec {
    #[default]
    #[value(name = "H264")]
    H264,
    #[value(name = "H265")]
    H265,
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::H264 => write!(f, "H264"),
            Codec::H265 => write!(f, "H265"),
        }
    }
}

/// Stream muxer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxerSettings {
    /// Output width of batched frames
    pub width: u32,
    /// Output height of batched frames
    pub height: u32,
    /// Microseconds to wait before pushing an incomplete batch (-1 waits forever)
    pub batched_push_timeout: i32,
}

impl Default for MuxerSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            batched_push_timeout: 4_000_000,
        }
    }
}

/// Per-camera decoding unit configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub decoder: DecoderStrategy,
    /// CUDA memory type for hardware decoders (2 = unified memory)
    pub cudadec_memtype: u32,
    /// Seconds between RTSP reconnection attempts
    pub rtsp_reconnect_interval: u32,
    /// RTP transport selection (0 = automatic)
    pub select_rtp_protocol: u32,
    /// Restart file sources at end of stream
    pub file_loop: bool,
    /// Treat a decoder that did not negotiate accelerated memory as a failed source
    pub strict_memory: bool,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            decoder: DecoderStrategy::default(),
            cudadec_memtype: 2,
            rtsp_reconnect_interval: 10,
            select_rtp_protocol: 0,
            file_loop: false,
            strict_memory: false,
        }
    }
}

/// Inference stage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    /// Config file handed to the primary inference stage
    pub primary_config: PathBuf,
    /// Config file for the secondary stage
    pub secondary_config: PathBuf,
    /// Whether the secondary stage is part of the chain
    pub secondary_enabled: bool,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            primary_config: PathBuf::from("./config/pgie1_config.txt"),
            secondary_config: PathBuf::from("./config/sgie1_config.txt"),
            secondary_enabled: true,
        }
    }
}

impl InferenceSettings {
    /// Secondary stage config, if that stage is enabled
    pub fn secondary(&self) -> Option<&Path> {
        self.secondary_enabled
            .then_some(self.secondary_config.as_path())
    }
}

/// On-screen display and sink configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// OSD process mode (0 = CPU)
    pub process_mode: u32,
    pub display_text: bool,
    /// Whether the sink synchronises on buffer timestamps
    pub sync: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            process_mode: 0,
            display_text: true,
            sync: false,
        }
    }
}

/// Encoded output parameters.
///
/// Carried for an encoder stage; the display sink does not consume them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub codec: Codec,
    /// Bits per second
    pub bitrate: u32,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            codec: Codec::H264,
            bitrate: 6_000_000,
        }
    }
}

/// Complete pipeline settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub muxer: MuxerSettings,
    pub source: SourceSettings,
    pub inference: InferenceSettings,
    pub display: DisplaySettings,
    pub output: OutputSettings,
}

impl PipelineSettings {
    /// Load settings from TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileReadError(path.to_path_buf(), e))?;

        let settings: PipelineSettings = toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to TOML file
    pub fn to_toml_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(format!("TOML serialize error: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::FileWriteError(path.to_path_buf(), e))?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.muxer.width == 0 || self.muxer.height == 0 {
            return Err(ConfigError::InvalidValue(format!(
                "muxer resolution must be non-zero, got {}x{}",
                self.muxer.width, self.muxer.height
            )));
        }

        if self.muxer.batched_push_timeout < -1 {
            return Err(ConfigError::InvalidValue(format!(
                "batched_push_timeout must be -1 or greater, got {}",
                self.muxer.batched_push_timeout
            )));
        }

        if self.inference.primary_config.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue(
                "primary_config must not be empty".to_string(),
            ));
        }

        if let Some(secondary) = self.inference.secondary() {
            if secondary.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "secondary_config must not be empty when the secondary stage is enabled"
                        .to_string(),
                ));
            }
        }

        if self.source.file_loop && self.source.decoder != DecoderStrategy::NvUriSrcBin {
            return Err(ConfigError::InvalidValue(
                "file_loop requires the nvurisrcbin decoder".to_string(),
            ));
        }

        if self.output.bitrate == 0 {
            return Err(ConfigError::InvalidValue(
                "bitrate must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
