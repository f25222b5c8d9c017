//! Camera sources that need no capture hardware

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;

use super::{CameraError, CameraSource, CameraStream, VideoFrame};

/// Treats an image file as the camera
///
/// Every capture re-reads the file, so another process (a phone bridge,
/// `ffmpeg -update 1`) can keep overwriting it with live frames.
#[derive(Debug, Clone)]
pub struct StillCamera {
    path: PathBuf,
}

impl StillCamera {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl CameraSource for StillCamera {
    async fn open(&self) -> Result<Box<dyn CameraStream>, CameraError> {
        let path = self.path.clone();
        // Probe once so a missing device is reported at start-up
        let probe = tokio::task::spawn_blocking(move || read_frame(&path))
            .await
            .map_err(|e| CameraError::Capture(e.to_string()))??;

        tracing::info!(
            path = %self.path.display(),
            width = probe.width,
            height = probe.height,
            "still camera opened"
        );

        Ok(Box::new(StillStream {
            path: self.path.clone(),
        }))
    }
}

struct StillStream {
    path: PathBuf,
}

impl CameraStream for StillStream {
    fn capture(&mut self) -> Result<VideoFrame, CameraError> {
        read_frame(&self.path)
    }
}

impl Drop for StillStream {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path.display(), "still camera released");
    }
}

fn read_frame(path: &std::path::Path) -> Result<VideoFrame, CameraError> {
    let data = std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => CameraError::NotFound,
        ErrorKind::PermissionDenied => CameraError::PermissionDenied,
        _ => CameraError::Capture(e.to_string()),
    })?;

    let format = image::guess_format(&data).map_err(|e| CameraError::Capture(e.to_string()))?;
    let (width, height) = image::ImageReader::with_format(std::io::Cursor::new(&data), format)
        .into_dimensions()
        .map_err(|e| CameraError::Capture(e.to_string()))?;

    Ok(VideoFrame {
        mime: format.to_mime_type().to_string(),
        data,
        width,
        height,
    })
}

/// Camera source for hosts with no camera configured
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableCamera;

#[async_trait]
impl CameraSource for UnavailableCamera {
    async fn open(&self) -> Result<Box<dyn CameraStream>, CameraError> {
        Err(CameraError::Unsupported)
    }
}
