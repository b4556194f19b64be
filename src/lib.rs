//! Multi-camera video analytics pipeline
//!
//! Assembles a batched DeepStream processing graph from a list of camera
//! URIs: one decoding bin per camera feeding a stream muxer, followed by
//! inference, on-screen display and a video sink.

pub mod assembler;
pub mod config;
#[cfg(feature = "deepstream")]
pub mod deepstream;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod probe;
pub mod source;
pub mod utils;

// Re-export commonly used types
pub use assembler::{assemble, Graph};
pub use config::{Camera, CameraList, ConfigError, DecoderStrategy, PipelineSettings};
pub use error::{GraphError, GraphResult};
pub use host::PluginHost;
pub use lifecycle::{launch, run, RunOutcome};
pub use probe::{MetadataProbe, ProbeSnapshot, ProbeStats};
pub use source::{build_source, BindingState, SourceBin};
pub use utils::{BatchDetections, FrameDetections, ObjectDetection};

/// Current version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
