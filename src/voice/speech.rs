//! Speech synthesis and recognition contract

use std::fmt;

use tokio::sync::mpsc;

use super::RecognitionErrorKind;

/// Identifies one utterance passed to [`SpeechIo::speak`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtteranceId(pub u64);

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "utt-{}", self.0)
    }
}

/// Identifies one recognition session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rec-{}", self.0)
    }
}

/// Notifications emitted by a speech adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// An utterance finished playing or was cancelled
    UtteranceEnded { id: UtteranceId },

    /// Recognized text; interim results may be revised later
    Transcript {
        session: SessionId,
        text: String,
        is_final: bool,
    },

    /// Recognition failed
    RecognitionError {
        session: SessionId,
        kind: RecognitionErrorKind,
    },

    /// The session is over, with or without a result
    SessionEnded { session: SessionId },
}

/// Sender half adapters use to report [`SpeechEvent`]s
pub type SpeechEvents = mpsc::UnboundedSender<SpeechEvent>;

/// Platform speech synthesis and recognition
///
/// Implementations must report exactly one
/// [`SpeechEvent::UtteranceEnded`] per `speak` call, whether the utterance
/// finished or was cut off. When synthesis is unavailable the event is
/// reported right away.
pub trait SpeechIo: Send + Sync {
    /// Speak `text`, cancelling whatever is currently being spoken
    fn speak(&self, id: UtteranceId, text: &str);

    /// Cut off the current utterance
    fn cancel_speech(&self);

    /// Begin listening
    ///
    /// # Errors
    ///
    /// Returns error if recognition is unsupported, not permitted, or a
    /// session is already running
    fn start_recognition(&self, session: SessionId) -> Result<(), RecognitionErrorKind>;

    /// Finish listening; pending results are delivered, then `SessionEnded`
    fn stop_recognition(&self, session: SessionId);

    /// Drop the session immediately; no further events are guaranteed
    fn abort_recognition(&self, session: SessionId);
}
