//! Utility types and functions

pub mod detection;

pub use detection::{BatchDetections, FrameDetections, ObjectDetection};
