//! Terminal speech adapter
//!
//! Prints utterances instead of synthesizing audio and takes recognized
//! speech from whoever drives the terminal (see `main.rs`).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::{RecognitionErrorKind, SessionId, SpeechEvent, SpeechEvents, SpeechIo, UtteranceId};

/// Shortest simulated utterance
const MIN_UTTERANCE: Duration = Duration::from_millis(300);

#[derive(Default)]
struct TerminalState {
    utterance: Option<(UtteranceId, JoinHandle<()>)>,
    session: Option<SessionId>,
}

/// Speech adapter backed by stdout
pub struct TerminalSpeech {
    events: SpeechEvents,
    state: Arc<Mutex<TerminalState>>,
    /// Simulated speaking time per word; `None` finishes utterances at once
    per_word: Option<Duration>,
}

impl TerminalSpeech {
    /// Create an adapter reporting to `events`
    #[must_use]
    pub fn new(events: SpeechEvents, per_word: Option<Duration>) -> Self {
        Self {
            events,
            state: Arc::new(Mutex::new(TerminalState::default())),
            per_word,
        }
    }

    /// Whether a recognition session is open
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.state.lock().is_ok_and(|s| s.session.is_some())
    }

    /// Deliver recognized text to the open session
    ///
    /// A final transcript also ends the session. Returns false when nobody
    /// is listening.
    pub fn hear(&self, text: &str, is_final: bool) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        let Some(session) = state.session else {
            return false;
        };

        let _ = self.events.send(SpeechEvent::Transcript {
            session,
            text: text.to_string(),
            is_final,
        });
        if is_final {
            state.session = None;
            let _ = self.events.send(SpeechEvent::SessionEnded { session });
        }
        true
    }

    /// Fail the open session with a platform error code
    pub fn fail(&self, code: &str) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        let Some(session) = state.session.take() else {
            return false;
        };

        let kind = RecognitionErrorKind::from_code(code);
        tracing::debug!(session = %session, error = %kind, "simulated recognition error");
        let _ = self.events.send(SpeechEvent::RecognitionError { session, kind });
        let _ = self.events.send(SpeechEvent::SessionEnded { session });
        true
    }

    fn speaking_time(&self, text: &str) -> Option<Duration> {
        let per_word = self.per_word?;
        let words = u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX);
        Some(per_word.saturating_mul(words).max(MIN_UTTERANCE))
    }

    /// End the current utterance early, reporting it as ended
    fn interrupt(&self, state: &mut TerminalState) {
        if let Some((id, task)) = state.utterance.take() {
            task.abort();
            let _ = self.events.send(SpeechEvent::UtteranceEnded { id });
        }
    }
}

impl SpeechIo for TerminalSpeech {
    fn speak(&self, id: UtteranceId, text: &str) {
        let Ok(mut state) = self.state.lock() else {
            let _ = self.events.send(SpeechEvent::UtteranceEnded { id });
            return;
        };
        self.interrupt(&mut state);

        println!("🔊 {text}");

        let Some(duration) = self.speaking_time(text) else {
            let _ = self.events.send(SpeechEvent::UtteranceEnded { id });
            return;
        };

        let events = self.events.clone();
        let shared = Arc::clone(&self.state);
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            // Whoever removes the utterance from the state reports its end
            let finished = shared
                .lock()
                .is_ok_and(|mut s| s.utterance.take_if(|(current, _)| *current == id).is_some());
            if finished {
                let _ = events.send(SpeechEvent::UtteranceEnded { id });
            }
        });
        state.utterance = Some((id, task));
    }

    fn cancel_speech(&self) {
        if let Ok(mut state) = self.state.lock() {
            self.interrupt(&mut state);
        }
    }

    fn start_recognition(&self, session: SessionId) -> Result<(), RecognitionErrorKind> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| RecognitionErrorKind::AudioCaptureUnavailable)?;
        if let Some(active) = state.session {
            return Err(RecognitionErrorKind::Other(format!(
                "session {active} already running"
            )));
        }
        state.session = Some(session);
        println!("🎤 listening (type `say ...`)");
        Ok(())
    }

    fn stop_recognition(&self, session: SessionId) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.session == Some(session) {
            state.session = None;
            let _ = self.events.send(SpeechEvent::SessionEnded { session });
        }
    }

    fn abort_recognition(&self, session: SessionId) {
        if let Ok(mut state) = self.state.lock()
            && state.session == Some(session)
        {
            state.session = None;
        }
    }
}
