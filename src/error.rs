//! Error types for pipeline assembly and execution
//!
//! Every failure during startup is fatal except pad binding, which only
//! costs the affected camera its video.

use crate::config::ConfigError;
use thiserror::Error;

/// Main error type for graph construction and lifecycle
#[derive(Error, Debug)]
pub enum GraphError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unable to create element '{name}' from factory '{factory}'")]
    ElementCreation { factory: String, name: String },

    #[error("Failed to link {from} to {to}")]
    Link { from: String, to: String },

    #[error("Unable to request pad '{pad}' on {element}")]
    PadRequest { element: String, pad: String },

    #[error("Failed to bind output of {bin}: {reason}")]
    PadBind { bin: String, reason: String },

    #[error("Unable to set property '{property}' on {element}: {reason}")]
    Property {
        element: String,
        property: String,
        reason: String,
    },

    #[error("Unable to set the pipeline to the {state} state")]
    StateChange { state: String },

    #[error("Pipeline error: {0}")]
    Pipeline(String),
}

/// Result type alias for convenience
pub type GraphResult<T> = std::result::Result<T, GraphError>;

impl GraphError {
    /// Whether the run must stop when this error is seen.
    ///
    /// Only pad binding is scoped to a single camera.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, GraphError::PadBind { .. })
    }

    pub(crate) fn link(from: impl Into<String>, to: impl Into<String>) -> Self {
        GraphError::Link {
            from: from.into(),
            to: to.into(),
        }
    }

    pub(crate) fn creation(factory: impl Into<String>, name: impl Into<String>) -> Self {
        GraphError::ElementCreation {
            factory: factory.into(),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = GraphError::creation("nvstreammux", "stream-muxer");
        assert_eq!(
            error.to_string(),
            "Unable to create element 'stream-muxer' from factory 'nvstreammux'"
        );

        let error = GraphError::link("stream-muxer", "primary-inference");
        assert_eq!(
            error.to_string(),
            "Failed to link stream-muxer to primary-inference"
        );
    }

    #[test]
    fn test_config_error_conversion() {
        let config_error = ConfigError::MissingField("Cam2.sURI".to_string());
        let graph_error: GraphError = config_error.into();

        match graph_error {
            GraphError::Config(ConfigError::MissingField(field)) => {
                assert_eq!(field, "Cam2.sURI");
            }
            _ => panic!("Expected Config variant"),
        }
    }

    #[test]
    fn test_fatality() {
        let bind = GraphError::PadBind {
            bin: "source-bin-00".to_string(),
            reason: "no target".to_string(),
        };
        assert!(!bind.is_fatal());
        assert!(GraphError::link("a", "b").is_fatal());
        assert!(GraphError::StateChange {
            state: "PLAYING".to_string()
        }
        .is_fatal());
    }
}
