//! Remote object detector
//!
//! Posts the frame as base64 JSON and expects a list of
//! `{label, confidence, bbox: [x, y, width, height]}` in frame pixels.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::vision::{BoundingBox, DetectedObject, ObjectDetector, VideoFrame};
use crate::{Error, Result};

/// Detector served over HTTP (e.g. a COCO-SSD or YOLO sidecar)
pub struct HttpDetector {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Serialize)]
struct DetectRequest<'a> {
    image: String,
    mime: &'a str,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct WireDetection {
    label: String,
    confidence: f32,
    bbox: [f32; 4],
}

impl From<WireDetection> for DetectedObject {
    fn from(wire: WireDetection) -> Self {
        let [x, y, width, height] = wire.bbox;
        Self {
            label: wire.label,
            confidence: wire.confidence,
            bbox: BoundingBox {
                x,
                y,
                width,
                height,
            },
        }
    }
}

impl HttpDetector {
    /// Create a new detector client
    ///
    /// # Errors
    ///
    /// Returns error if the URL is empty
    pub fn new(url: String) -> Result<Self> {
        if url.trim().is_empty() {
            return Err(Error::Config("detector URL is empty".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            url,
        })
    }
}

fn parse_detections(body: &str) -> Result<Vec<DetectedObject>> {
    let wire: Vec<WireDetection> = serde_json::from_str(body)?;
    let objects = wire
        .into_iter()
        .filter(|d| d.confidence.is_finite() && d.bbox.iter().all(|v| v.is_finite()))
        .map(DetectedObject::from)
        .collect();
    Ok(objects)
}

#[async_trait]
impl ObjectDetector for HttpDetector {
    async fn detect(&self, frame: &VideoFrame) -> Result<Vec<DetectedObject>> {
        let request = DetectRequest {
            image: base64::engine::general_purpose::STANDARD.encode(&frame.data),
            mime: &frame.mime,
            width: frame.width,
            height: frame.height,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Detection(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Detection(format!("API error {status}: {body}")));
        }

        let body = response.text().await?;
        let objects = parse_detections(&body)?;
        tracing::trace!(count = objects.len(), "objects detected");
        Ok(objects)
    }
}
