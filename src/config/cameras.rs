//! Camera list loading
//!
//! The camera file carries a one-line header that is not YAML, followed by
//! a `Main` section with the camera count and one `Cam{i}` section per
//! camera:
//!
//! ```text
//! %YAML:1.0
//! Main:
//!   iCamNum: 2
//! Cam1:
//!   sURI: rtsp://cam1/stream
//! Cam2:
//!   sURI: file:///videos/cam2.mp4
//! ```

use super::ConfigError;
use serde_yaml::Value;
use std::fmt;
use std::path::Path;

/// URI prefixes that denote a live network stream
const LIVE_PREFIXES: [&str; 2] = ["rtsp://", "rtsps://"];

/// Whether a URI points at a live source with no fixed timeline
pub fn is_live_uri(uri: &str) -> bool {
    let uri = uri.trim();
    LIVE_PREFIXES.iter().any(|prefix| uri.starts_with(prefix))
}

/// One configured camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Camera {
    /// Zero-based position in the declared order
    pub index: usize,
    pub uri: String,
}

impl Camera {
    pub fn new(index: usize, uri: impl Into<String>) -> Self {
        Self {
            index,
            uri: uri.into(),
        }
    }

    pub fn is_live(&self) -> bool {
        is_live_uri(&self.uri)
    }
}

impl fmt::Display for Camera {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "camera {} ({})", self.index, self.uri)
    }
}

/// Ordered, immutable list of cameras
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraList {
    cameras: Vec<Camera>,
}

impl CameraList {
    /// Build a list from URIs, assigning indices in order
    pub fn from_uris<I, S>(uris: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cameras = uris
            .into_iter()
            .enumerate()
            .map(|(index, uri)| Camera::new(index, uri))
            .collect();
        Self { cameras }
    }

    /// Load the camera list from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileReadError(path.to_path_buf(), e))?;
        Self::from_yaml_str(&content)
    }

    /// Parse the camera list, skipping the header line
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let body = content.split_once('\n').map(|(_, rest)| rest).unwrap_or("");

        let doc: Value = serde_yaml::from_str(body)
            .map_err(|e| ConfigError::ParseError(format!("YAML parse error: {}", e)))?;

        let main = doc
            .get("Main")
            .ok_or_else(|| ConfigError::MissingSection("Main".to_string()))?;

        let count = main
            .get("iCamNum")
            .ok_or_else(|| ConfigError::MissingField("Main.iCamNum".to_string()))?;
        let count = count
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "Main.iCamNum must be a non-negative integer, got {:?}",
                    count
                ))
            })?;

        // Sized by the sections actually found, not by the declared count
        let mut uris = Vec::new();
        for i in 1..=count {
            let tag = format!("Cam{}", i);
            let section = doc
                .get(tag.as_str())
                .ok_or_else(|| ConfigError::MissingSection(tag.clone()))?;

            let uri = section
                .get("sURI")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|uri| !uri.is_empty())
                .ok_or_else(|| ConfigError::MissingField(format!("{}.sURI", tag)))?;

            uris.push(uri.to_string());
        }

        Ok(Self::from_uris(uris))
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Camera> {
        self.cameras.iter()
    }

    /// True when at least one camera is live
    pub fn any_live(&self) -> bool {
        self.cameras.iter().any(Camera::is_live)
    }
}

impl<'a> IntoIterator for &'a CameraList {
    type Item = &'a Camera;
    type IntoIter = std::slice::Iter<'a, Camera>;

    fn into_iter(self) -> Self::IntoIter {
        self.cameras.iter()
    }
}
