//! Detection records read from inference metadata

use std::fmt;

/// A detected object with bounding box and classification
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectDetection {
    /// Class ID assigned by the inference stage
    pub class_id: i32,
    /// Confidence score
    pub confidence: f32,
    /// Left X coordinate
    pub left: f32,
    /// Top Y coordinate
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ObjectDetection {
    /// Create a new detection
    pub fn new(class_id: i32, confidence: f32, left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            class_id,
            confidence,
            left,
            top,
            width,
            height,
        }
    }

    /// Calculate the area of the bounding box
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Right X coordinate
    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    /// Bottom Y coordinate
    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }
}

impl fmt::Display for ObjectDetection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Class ID {}, Confidence: {:.2}, Bounding Box: ({:.1}, {:.1}, {:.1}, {:.1})",
            self.class_id, self.confidence, self.left, self.top, self.width, self.height
        )
    }
}

/// Detections for one frame of a batch
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameDetections {
    /// Muxer input the frame came from
    pub source_id: u32,
    pub frame_num: i32,
    pub objects: Vec<ObjectDetection>,
}

impl FrameDetections {
    pub fn new(source_id: u32, frame_num: i32, objects: Vec<ObjectDetection>) -> Self {
        Self {
            source_id,
            frame_num,
            objects,
        }
    }
}

/// Detections for a whole batch buffer
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BatchDetections {
    pub frames: Vec<FrameDetections>,
}

impl BatchDetections {
    pub fn new(frames: Vec<FrameDetections>) -> Self {
        Self { frames }
    }

    /// Total number of objects across all frames
    pub fn object_count(&self) -> usize {
        self.frames.iter().map(|f| f.objects.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_geometry() {
        let det = ObjectDetection::new(2, 0.8, 10.0, 20.0, 30.0, 40.0);
        assert_eq!(det.area(), 1200.0);
        assert_eq!(det.right(), 40.0);
        assert_eq!(det.bottom(), 60.0);
    }

    #[test]
    fn test_detection_display() {
        let det = ObjectDetection::new(0, 0.91, 1.0, 2.0, 3.0, 4.0);
        assert_eq!(
            det.to_string(),
            "Class ID 0, Confidence: 0.91, Bounding Box: (1.0, 2.0, 3.0, 4.0)"
        );
    }

    #[test]
    fn test_batch_object_count() {
        let batch = BatchDetections::new(vec![
            FrameDetections::new(0, 1, vec![ObjectDetection::new(0, 0.5, 0.0, 0.0, 1.0, 1.0)]),
            FrameDetections::new(1, 1, Vec::new()),
            FrameDetections::new(
                2,
                1,
                vec![
                    ObjectDetection::new(1, 0.6, 0.0, 0.0, 1.0, 1.0),
                    ObjectDetection::new(2, 0.7, 0.0, 0.0, 1.0, 1.0),
                ],
            ),
        ]);
        assert_eq!(batch.object_count(), 3);
        assert_eq!(BatchDetections::default().object_count(), 0);
    }
}
