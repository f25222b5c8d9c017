//! Camera detection loop
//!
//! Each tick captures a frame, runs detection, draws the boxes and asks for
//! a description. A tick is skipped while the previous frame is still being
//! detected or described, so at most one of each is ever in flight.

use std::sync::Arc;

use tokio::time::{Interval, MissedTickBehavior};

use super::{ApplicationMode, Controller, Epoch, Event, ModeState, messages};
use crate::display::DisplayUpdate;
use crate::vision::{
    CameraStream, DescribeError, DescribeRequest, DetectionFrame, VideoFrame, same_description,
};

pub(super) struct CameraSession {
    epoch: Epoch,
    stream: Box<dyn CameraStream>,
    pub(super) ticker: Interval,
    detecting: bool,
    describing: bool,
    /// Last description handed to the describer as context
    last_description: Option<String>,
    /// Last text actually spoken, to avoid repeating it
    last_spoken: Option<String>,
}

impl CameraSession {
    fn new(epoch: Epoch, stream: Box<dyn CameraStream>, ticker: Interval) -> Self {
        Self {
            epoch,
            stream,
            ticker,
            detecting: false,
            describing: false,
            last_description: None,
            last_spoken: None,
        }
    }

    const fn is_busy(&self) -> bool {
        self.detecting || self.describing
    }
}

impl Controller {
    /// Whether a frame is being detected or described
    #[must_use]
    pub const fn is_detection_busy(&self) -> bool {
        match &self.mode {
            ModeState::Camera(camera) => camera.is_busy(),
            _ => false,
        }
    }

    fn camera_mut(&mut self, epoch: Option<Epoch>) -> Option<&mut CameraSession> {
        match &mut self.mode {
            ModeState::Camera(camera) if epoch.is_none_or(|e| e == camera.epoch) => Some(camera),
            _ => None,
        }
    }

    pub(super) fn enter_camera(&mut self, stream: Box<dyn CameraStream>) {
        let epoch = self.counters.next_epoch();
        // First tick completes immediately, so the first frame is captured right away
        let mut ticker = tokio::time::interval(self.settings.detection.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.mode = ModeState::Camera(CameraSession::new(epoch, stream, ticker));
        tracing::info!(
            epoch = %epoch,
            interval_ms = self.settings.detection.interval.as_millis(),
            "camera mode entered"
        );
        self.display.send(DisplayUpdate::Mode(ApplicationMode::Camera));
        self.announce(messages::CAMERA_ACTIVE);
    }

    pub(super) fn on_detection_tick(&mut self) {
        let detector = Arc::clone(&self.services.detector);
        let tasks = self.tasks.clone();
        let min_confidence = self.settings.detection.min_confidence;

        let Some(camera) = self.camera_mut(None) else {
            tracing::trace!("detection tick outside camera mode");
            return;
        };
        if camera.is_busy() {
            tracing::debug!(
                detecting = camera.detecting,
                describing = camera.describing,
                "previous frame still in flight, skipping tick"
            );
            return;
        }

        let frame = match camera.stream.capture() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "frame capture failed");
                return;
            }
        };
        camera.detecting = true;
        let epoch = camera.epoch;

        tokio::spawn(async move {
            let objects = detector.detect(&frame).await.unwrap_or_else(|e| {
                tracing::warn!(error = %e, "object detection failed");
                Vec::new()
            });
            let detections = DetectionFrame::new(objects, min_confidence);
            tracing::trace!(epoch = %epoch, objects = detections.objects.len(), "frame detected");

            if tasks
                .send(Event::FrameDetected {
                    epoch,
                    image: frame,
                    detections,
                })
                .is_err()
            {
                tracing::debug!("controller gone, dropping detection result");
            }
        });
    }

    pub(super) fn on_frame_detected(
        &mut self,
        epoch: Epoch,
        image: VideoFrame,
        detections: DetectionFrame,
    ) {
        let describer = Arc::clone(&self.services.describer);
        let tasks = self.tasks.clone();

        let Some(camera) = self.camera_mut(Some(epoch)) else {
            tracing::debug!(epoch = %epoch, "stale detection discarded");
            return;
        };
        camera.detecting = false;

        let overlay = detections.objects.clone();
        let request = if camera.describing {
            None
        } else {
            camera.describing = true;
            Some(DescribeRequest {
                image,
                detections,
                previous_description: camera.last_description.clone(),
            })
        };

        self.display.send(DisplayUpdate::Overlay(overlay));

        if let Some(request) = request {
            tokio::spawn(async move {
                let result = describer.describe(request).await;
                if tasks.send(Event::SceneDescribed { epoch, result }).is_err() {
                    tracing::debug!("controller gone, dropping scene description");
                }
            });
        }
    }

    pub(super) fn on_scene_described(&mut self, epoch: Epoch, result: Result<String, DescribeError>) {
        let Some(camera) = self.camera_mut(Some(epoch)) else {
            tracing::debug!(epoch = %epoch, "stale description discarded");
            return;
        };
        camera.describing = false;

        match result {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    tracing::trace!("nothing to describe");
                    return;
                }
                camera.last_description = Some(text.to_string());
                self.display.send(DisplayUpdate::Description(text.to_string()));
                self.offer_speech(text);
            }
            Err(e) => {
                // Failures are always shown and spoken, even over other speech
                tracing::warn!(error = %e, "scene description failed");
                self.announce(e.user_message());
            }
        }
    }

    /// Speak camera output unless it repeats the last one or would cut off
    /// other speech
    fn offer_speech(&mut self, text: &str) {
        let speaking = self.is_speaking();
        let Some(camera) = self.camera_mut(None) else {
            return;
        };

        let repeated = camera
            .last_spoken
            .as_deref()
            .is_some_and(|last| same_description(last, text));
        if repeated || speaking {
            tracing::debug!(repeated, speaking, "description not spoken");
            return;
        }

        camera.last_spoken = Some(text.to_string());
        self.announce(text);
    }
}
