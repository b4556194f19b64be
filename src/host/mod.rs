//! Plugin host boundary
//!
//! The pipeline code never talks to GStreamer directly. It instantiates
//! elements by factory name, sets properties, links pads and drives state
//! through [`PluginHost`]. [`gst::GstHost`] is the real implementation;
//! [`memory::MemoryHost`] simulates a plugin registry in-process for
//! dry runs and tests.

#[cfg(feature = "gst")]
pub mod gst;
pub mod memory;

use crate::error::GraphResult;
use crate::utils::BatchDetections;
use std::fmt;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Caps feature carried by buffers in accelerated (NVMM) memory
pub const NVMM_FEATURE: &str = "memory:NVMM";

/// Property value handed to an element
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Str(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::UInt(v) => write!(f, "{}", v),
            PropertyValue::Str(v) => write!(f, "{}", v),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int(v.into())
    }
}

impl From<u32> for PropertyValue {
    fn from(v: u32) -> Self {
        PropertyValue::UInt(v.into())
    }
}

impl From<usize> for PropertyValue {
    fn from(v: usize) -> Self {
        PropertyValue::UInt(v as u64)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Str(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Str(v)
    }
}

impl From<&Path> for PropertyValue {
    fn from(v: &Path) -> Self {
        PropertyValue::Str(v.to_string_lossy().into_owned())
    }
}

/// Media type announced on a newly created pad
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// Structure name, e.g. `video/x-raw`
    pub name: String,
    /// Caps features, e.g. `memory:NVMM`
    pub features: Vec<String>,
}

impl MediaType {
    pub fn new<I, S>(name: impl Into<String>, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            features: features.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_video(&self) -> bool {
        self.name.starts_with("video/")
    }

    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }

    /// Whether frames stay in accelerated device memory
    pub fn has_accelerated_memory(&self) -> bool {
        self.has_feature(NVMM_FEATURE)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.features.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}({})", self.name, self.features.join(", "))
        }
    }
}

/// Pipeline states driven by the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Null,
    Ready,
    Paused,
    Playing,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Null => "NULL",
            PipelineState::Ready => "READY",
            PipelineState::Paused => "PAUSED",
            PipelineState::Playing => "PLAYING",
        };
        write!(f, "{}", name)
    }
}

/// Why the blocking wait on a running pipeline returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The shutdown flag was raised
    Interrupted,
    EndOfStream,
    /// The framework reported a fatal error
    Error(String),
}

/// Called when an element announces a new pad
pub type PadAddedHandler<H> =
    Arc<dyn Fn(&<H as PluginHost>::Pad, &MediaType) + Send + Sync + 'static>;

/// Called with the new child element and its name
pub type ChildAddedHandler<H> =
    Arc<dyn Fn(&<H as PluginHost>::Element, &str) + Send + Sync + 'static>;

/// Called for every buffer crossing a probed pad, with its batch metadata if any
pub type BatchObserver = Arc<dyn Fn(Option<&BatchDetections>) + Send + Sync + 'static>;

/// The native plugin framework as seen by the pipeline code
pub trait PluginHost: Clone + Send + Sync + 'static {
    type Element: Clone + Send + Sync + 'static;
    type Pad: Clone + Send + Sync + 'static;

    fn create_pipeline(&self, name: &str) -> GraphResult<Self::Element>;

    fn create_bin(&self, name: &str) -> GraphResult<Self::Element>;

    /// Instantiate an element from the plugin registry
    fn make_element(&self, factory: &str, name: &str) -> GraphResult<Self::Element>;

    fn element_name(&self, element: &Self::Element) -> String;

    fn has_property(&self, element: &Self::Element, property: &str) -> bool;

    fn set_property(
        &self,
        element: &Self::Element,
        property: &str,
        value: &PropertyValue,
    ) -> GraphResult<()>;

    /// Add `child` to a pipeline or bin
    fn add(&self, bin: &Self::Element, child: &Self::Element) -> GraphResult<()>;

    /// Add a source ghost pad with no target yet
    fn add_ghost_pad(&self, bin: &Self::Element, name: &str) -> GraphResult<()>;

    fn set_ghost_target(
        &self,
        bin: &Self::Element,
        name: &str,
        target: &Self::Pad,
    ) -> GraphResult<()>;

    /// Request a named pad from an element with request pad templates
    fn request_pad(&self, element: &Self::Element, name: &str) -> GraphResult<()>;

    /// Link the default pads of two elements
    fn link(&self, src: &Self::Element, sink: &Self::Element) -> GraphResult<()>;

    /// Link two named pads
    fn link_pads(
        &self,
        src: &Self::Element,
        src_pad: &str,
        sink: &Self::Element,
        sink_pad: &str,
    ) -> GraphResult<()>;

    fn connect_pad_added(&self, element: &Self::Element, handler: PadAddedHandler<Self>);

    fn connect_child_added(&self, element: &Self::Element, handler: ChildAddedHandler<Self>);

    /// Whether batch metadata attached by the inference stage can be decoded
    fn reads_batch_metadata(&self) -> bool;

    /// Observe buffers on a pad without altering them
    fn add_batch_probe(
        &self,
        element: &Self::Element,
        pad: &str,
        observer: BatchObserver,
    ) -> GraphResult<()>;

    fn set_state(&self, pipeline: &Self::Element, state: PipelineState) -> GraphResult<()>;

    /// Block until `shutdown` is raised, the stream ends or the pipeline fails
    fn wait(&self, pipeline: &Self::Element, shutdown: &AtomicBool) -> GraphResult<WaitOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type() {
        let nvmm = MediaType::new("video/x-raw", [NVMM_FEATURE]);
        assert!(nvmm.is_video());
        assert!(nvmm.has_accelerated_memory());
        assert_eq!(nvmm.to_string(), "video/x-raw(memory:NVMM)");

        let system = MediaType::new("video/x-raw", Vec::<String>::new());
        assert!(system.is_video());
        assert!(!system.has_accelerated_memory());
        assert_eq!(system.to_string(), "video/x-raw");

        let audio = MediaType::new("audio/x-raw", Vec::<String>::new());
        assert!(!audio.is_video());
    }

    #[test]
    fn test_property_values() {
        assert_eq!(PropertyValue::from(true).to_string(), "true");
        assert_eq!(PropertyValue::from(-1i32).to_string(), "-1");
        assert_eq!(PropertyValue::from(4_000_000u32).to_string(), "4000000");
        assert_eq!(
            PropertyValue::from(Path::new("./config/pgie1_config.txt")),
            PropertyValue::Str("./config/pgie1_config.txt".to_string())
        );
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PipelineState::Playing.to_string(), "PLAYING");
        assert_eq!(PipelineState::Null.to_string(), "NULL");
    }
}
