//! Visual feedback
//!
//! Everything spoken is also shown, for users with partial sight and for
//! sighted helpers. Updates are fire-and-forget: a headless run simply
//! drops the receiver.

use tokio::sync::mpsc;

use crate::controller::ApplicationMode;
use crate::vision::DetectedObject;

/// One change to what the screen shows
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayUpdate {
    /// Main status line
    Status(String),
    /// Short-lived notice that does not replace the status
    Notice(String),
    /// Latest scene description
    Description(String),
    /// Bounding boxes for the current frame
    Overlay(Vec<DetectedObject>),
    ClearOverlay,
    /// Active mode changed
    Mode(ApplicationMode),
}

/// Sender for display updates
#[derive(Debug, Clone)]
pub struct Display {
    tx: mpsc::UnboundedSender<DisplayUpdate>,
}

impl Display {
    /// Create a display and the receiver that renders it
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DisplayUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, update: DisplayUpdate) {
        if self.tx.send(update).is_err() {
            tracing::trace!("display receiver closed");
        }
    }

    pub fn status(&self, text: impl Into<String>) {
        self.send(DisplayUpdate::Status(text.into()));
    }

    pub fn notice(&self, text: impl Into<String>) {
        self.send(DisplayUpdate::Notice(text.into()));
    }
}
