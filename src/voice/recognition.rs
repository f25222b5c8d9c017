//! Recognition sessions and their failure modes

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::{SessionId, SpeechIo};

/// Why a recognition session failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    #[error("no speech detected")]
    NoSpeech,

    #[error("audio capture unavailable")]
    AudioCaptureUnavailable,

    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("network error during recognition")]
    NetworkError,

    #[error("recognition error: {0}")]
    Other(String),
}

/// What the assistant should do after a recognition error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// End the session; the user starts again when ready
    EndSession,
    /// End the session and report; retrying cannot help
    Fatal,
    /// Report and listen again
    Retry,
}

impl RecognitionErrorKind {
    /// Map a platform error code (e.g. `"no-speech"`, `"not-allowed"`)
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "no-speech" => Self::NoSpeech,
            "audio-capture" => Self::AudioCaptureUnavailable,
            "not-allowed" | "service-not-allowed" => Self::PermissionDenied,
            "network" => Self::NetworkError,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub const fn disposition(&self) -> ErrorDisposition {
        match self {
            Self::NoSpeech => ErrorDisposition::EndSession,
            Self::AudioCaptureUnavailable | Self::PermissionDenied => ErrorDisposition::Fatal,
            Self::NetworkError | Self::Other(_) => ErrorDisposition::Retry,
        }
    }

    /// Message spoken to the user
    #[must_use]
    pub const fn user_message(&self) -> &'static str {
        match self {
            Self::NoSpeech => "Didn't catch that. Tap and hold to try again.",
            Self::AudioCaptureUnavailable => {
                "No microphone found or microphone is not working."
            }
            Self::PermissionDenied => {
                "Microphone permission denied. Please enable it in your device settings."
            }
            Self::NetworkError => {
                "Network error during speech recognition. Please check your connection."
            }
            Self::Other(_) => "Speech recognition error.",
        }
    }
}

/// A live recognition session
///
/// Ending the session consumes the handle, so a session cannot be stopped
/// twice. Dropping a handle that was not ended aborts the session.
pub struct SessionHandle {
    id: SessionId,
    io: Arc<dyn SpeechIo>,
    live: bool,
}

impl SessionHandle {
    /// Start a recognition session
    ///
    /// # Errors
    ///
    /// Returns the adapter's error if the session cannot start
    pub fn start(io: Arc<dyn SpeechIo>, id: SessionId) -> Result<Self, RecognitionErrorKind> {
        io.start_recognition(id)?;
        tracing::debug!(session = %id, "recognition started");
        Ok(Self { id, io, live: true })
    }

    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// End gracefully, letting pending results arrive
    pub fn stop(mut self) {
        self.live = false;
        tracing::debug!(session = %self.id, "recognition stopped");
        self.io.stop_recognition(self.id);
    }

    /// End immediately
    pub fn abort(mut self) {
        self.live = false;
        tracing::debug!(session = %self.id, "recognition aborted");
        self.io.abort_recognition(self.id);
    }

    /// Forget a session the adapter already ended
    pub fn finish(mut self) {
        self.live = false;
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.live {
            tracing::debug!(session = %self.id, "recognition handle dropped, aborting");
            self.io.abort_recognition(self.id);
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}
