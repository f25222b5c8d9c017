//! Speech I/O
//!
//! The [`SpeechIo`] trait is the boundary to the platform's speech
//! synthesis and recognition. Calls into it are synchronous and
//! non-blocking; everything it reports back arrives later as a
//! [`SpeechEvent`] on a channel.

mod recognition;
mod speech;
mod terminal;

pub use recognition::{ErrorDisposition, RecognitionErrorKind, SessionHandle};
pub use speech::{SessionId, SpeechEvent, SpeechEvents, SpeechIo, UtteranceId};
pub use terminal::TerminalSpeech;
