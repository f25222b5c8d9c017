//! Camera frames, object detection and scene description
//!
//! Collaborators are trait objects so the controller can run against real
//! devices and model endpoints or against test doubles.

mod camera;
mod describe;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::Result;

pub use camera::{StillCamera, UnavailableCamera};
pub use describe::{
    DescribeError, DescribeRequest, LabelDescriber, SceneDescriber, describe_position,
    same_description,
};

/// One encoded camera image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    /// Encoded image bytes
    pub data: Vec<u8>,
    /// MIME type of `data` (e.g. "image/jpeg")
    pub mime: String,
    pub width: u32,
    pub height: u32,
}

/// Axis-aligned box in frame pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// A single detection
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedObject {
    pub label: String,
    /// Score in `[0, 1]`
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl DetectedObject {
    /// Overlay caption, e.g. "cup 92%"
    #[must_use]
    pub fn caption(&self) -> String {
        format!("{} {:.0}%", self.label, self.confidence * 100.0)
    }
}

/// Detections from one captured frame
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionFrame {
    pub timestamp: DateTime<Utc>,
    pub objects: Vec<DetectedObject>,
}

impl DetectionFrame {
    /// Keep detections at or above `min_confidence`
    #[must_use]
    pub fn new(objects: Vec<DetectedObject>, min_confidence: f32) -> Self {
        Self {
            timestamp: Utc::now(),
            objects: objects
                .into_iter()
                .filter(|o| o.confidence >= min_confidence)
                .collect(),
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Distinct labels in detection order
    #[must_use]
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for object in &self.objects {
            if !labels.contains(&object.label.as_str()) {
                labels.push(&object.label);
            }
        }
        labels
    }
}

/// Why the camera could not be used
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera found")]
    NotFound,

    #[error("camera busy or hardware error")]
    Busy,

    #[error("camera not supported")]
    Unsupported,

    #[error("camera cannot satisfy the requested constraints")]
    Overconstrained,

    #[error("camera start timed out")]
    Timeout,

    #[error("capture failed: {0}")]
    Capture(String),
}

impl CameraError {
    /// Message spoken to the user
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "Camera permission denied. Please enable it in your device settings."
            }
            Self::NotFound => "No camera found. Ensure a camera is connected and enabled.",
            Self::Busy => "Camera is already in use or a hardware error occurred.",
            Self::Unsupported => "Camera not supported on this device.",
            Self::Overconstrained => "Camera does not support the requested settings.",
            Self::Timeout => "Camera timed out. Please try again.",
            Self::Capture(_) => "Error accessing camera.",
        }
    }
}

/// Camera device that can be opened for streaming
#[async_trait]
pub trait CameraSource: Send + Sync {
    /// Acquire the camera
    ///
    /// # Errors
    ///
    /// Returns error if the camera is missing, busy, or not permitted
    async fn open(&self) -> std::result::Result<Box<dyn CameraStream>, CameraError>;
}

/// An open camera; dropping it releases the device
pub trait CameraStream: Send {
    /// Grab the current frame
    ///
    /// # Errors
    ///
    /// Returns error if no frame could be read
    fn capture(&mut self) -> std::result::Result<VideoFrame, CameraError>;
}

/// Finds objects in a frame
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    /// Run detection
    ///
    /// # Errors
    ///
    /// Returns error if the model cannot be reached or its output is invalid
    async fn detect(&self, frame: &VideoFrame) -> Result<Vec<DetectedObject>>;
}

/// Detector used when no detection endpoint is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDetector;

#[async_trait]
impl ObjectDetector for NoDetector {
    async fn detect(&self, _frame: &VideoFrame) -> Result<Vec<DetectedObject>> {
        Ok(Vec::new())
    }
}
