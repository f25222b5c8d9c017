//! Scene description

use async_trait::async_trait;
use thiserror::Error;

use super::{BoundingBox, DetectionFrame, VideoFrame};

/// Most objects mentioned in one offline description
const MAX_OBJECTS_DESCRIBED: usize = 3;

/// Input for one description
#[derive(Debug, Clone)]
pub struct DescribeRequest {
    pub image: VideoFrame,
    pub detections: DetectionFrame,
    /// Last description produced in this camera session
    pub previous_description: Option<String>,
}

/// Why a description could not be produced
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DescribeError {
    #[error("invalid API credential")]
    InvalidCredential,

    #[error("rate limited")]
    RateLimited,

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("empty response")]
    EmptyResponse,
}

impl DescribeError {
    /// Classify an unsuccessful HTTP status
    #[must_use]
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => Self::InvalidCredential,
            429 => Self::RateLimited,
            _ => Self::Transient(format!("status {status}: {body}")),
        }
    }

    /// Message spoken to the user
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidCredential => {
                "Scene description is unavailable. Please check the API key."
            }
            Self::RateLimited => "Scene description is busy. Trying again shortly.",
            Self::Transient(_) => "Could not describe the scene. Trying again.",
            Self::EmptyResponse => "Could not identify object.",
        }
    }
}

/// Produces a spoken description of a frame
#[async_trait]
pub trait SceneDescriber: Send + Sync {
    /// Describe the scene
    ///
    /// # Errors
    ///
    /// Returns a classified error if no description could be produced
    async fn describe(&self, request: DescribeRequest) -> Result<String, DescribeError>;
}

/// Describes detections by label and position, without a language model
///
/// An empty frame produces an empty description, which is never spoken.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabelDescriber;

#[async_trait]
impl SceneDescriber for LabelDescriber {
    async fn describe(&self, request: DescribeRequest) -> Result<String, DescribeError> {
        let mut objects = request.detections.objects;
        objects.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let sentences: Vec<String> = objects
            .iter()
            .take(MAX_OBJECTS_DESCRIBED)
            .map(|object| {
                match describe_position(&object.bbox, request.image.width, request.image.height) {
                    Some(position) => format!("{} detected {position}.", object.label),
                    None => format!("{} detected.", object.label),
                }
            })
            .collect();

        Ok(sentences.join(" "))
    }
}

/// Where a box sits in the frame, in thirds: "on the left at the top"
///
/// Returns `None` when the frame size is unknown.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn describe_position(bbox: &BoundingBox, width: u32, height: u32) -> Option<String> {
    if width == 0 || height == 0 {
        return None;
    }
    let (cx, cy) = bbox.center();
    let (width, height) = (width as f32, height as f32);

    let horizontal = if cx < width / 3.0 {
        "on the left"
    } else if cx > width * 2.0 / 3.0 {
        "on the right"
    } else {
        "in the center"
    };
    let vertical = if cy < height / 3.0 {
        "at the top"
    } else if cy > height * 2.0 / 3.0 {
        "at the bottom"
    } else {
        "in the middle"
    };

    Some(format!("{horizontal} {vertical}"))
}

/// Whether two descriptions say the same thing, ignoring case and spacing
#[must_use]
pub fn same_description(a: &str, b: &str) -> bool {
    let normalize = |s: &str| {
        s.split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
    };
    normalize(a) == normalize(b)
}
