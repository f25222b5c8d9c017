//! Assistant turn coordination
//!
//! One assistant session cycles listen, query, speak, listen. Recognition
//! only runs while nothing is being spoken, and every session is closed
//! before the next one opens.

use std::sync::Arc;

use super::{AfterSpeech, ApplicationMode, Controller, Epoch, Event, ModeState, messages};
use crate::agent::AssistantRequest;
use crate::display::DisplayUpdate;
use crate::location::{self, LocationLookup};
use crate::voice::{ErrorDisposition, RecognitionErrorKind, SessionHandle, SessionId};

/// Where an assistant session is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Speaking a prompt or error; listening starts when it ends
    Announcing,
    /// Recognition session open
    Listening,
    /// Waiting for the assistant's reply
    Querying,
    /// Speaking the reply
    Speaking,
}

/// One question and its answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechTurn {
    pub transcript: String,
    pub reply: Option<String>,
}

pub(super) struct AssistantSession {
    epoch: Epoch,
    phase: TurnPhase,
    recognition: Option<SessionHandle>,
    /// Sessions in a row that ended with nothing heard
    silent: u32,
    turn: Option<SpeechTurn>,
}

impl AssistantSession {
    const fn new(epoch: Epoch) -> Self {
        Self {
            epoch,
            phase: TurnPhase::Announcing,
            recognition: None,
            silent: 0,
            turn: None,
        }
    }

    fn is_live(&self, session: SessionId) -> bool {
        self.recognition.as_ref().is_some_and(|h| h.id() == session)
    }

    pub(super) fn end(self) {
        if let Some(handle) = self.recognition {
            handle.abort();
        }
    }
}

impl Controller {
    /// Phase of the active assistant session
    #[must_use]
    pub const fn turn_phase(&self) -> Option<TurnPhase> {
        match &self.mode {
            ModeState::Assistant(session) => Some(session.phase),
            _ => None,
        }
    }

    /// The question currently being handled, if any
    #[must_use]
    pub const fn current_turn(&self) -> Option<&SpeechTurn> {
        match &self.mode {
            ModeState::Assistant(session) => session.turn.as_ref(),
            _ => None,
        }
    }

    const fn assistant_mut(&mut self) -> Option<&mut AssistantSession> {
        match &mut self.mode {
            ModeState::Assistant(session) => Some(session),
            _ => None,
        }
    }

    pub(super) fn enter_assistant(&mut self) {
        let epoch = self.counters.next_epoch();
        self.mode = ModeState::Assistant(AssistantSession::new(epoch));
        tracing::info!(epoch = %epoch, "assistant mode entered");
        self.display.send(DisplayUpdate::Mode(ApplicationMode::Assistant));

        self.set_status(messages::LISTENING);
        self.speak(messages::LISTENING, Some(AfterSpeech::Listen(epoch)));
    }

    /// Open a fresh recognition session, closing any previous one first
    pub(super) fn start_listening(&mut self) {
        let speech = Arc::clone(&self.speech);
        let session_id = self.counters.next_session();
        let Some(session) = self.assistant_mut() else {
            return;
        };

        if let Some(previous) = session.recognition.take() {
            tracing::debug!(session = %previous.id(), "closing previous recognition session");
            previous.abort();
        }
        session.turn = None;

        match SessionHandle::start(speech, session_id) {
            Ok(handle) => {
                session.recognition = Some(handle);
                session.phase = TurnPhase::Listening;
                self.set_status(messages::LISTENING);
            }
            Err(kind) => {
                tracing::warn!(error = %kind, "recognition failed to start");
                self.recover(&kind);
            }
        }
    }

    /// Close an open recognition session so speech is not heard back
    ///
    /// Returns the follow-up that resumes listening afterwards.
    pub(super) fn pause_listening(&mut self) -> Option<AfterSpeech> {
        let session = self.assistant_mut()?;
        let handle = session.recognition.take()?;
        tracing::debug!(session = %handle.id(), "pausing recognition while speaking");
        handle.abort();
        session.phase = TurnPhase::Announcing;
        Some(AfterSpeech::Listen(session.epoch))
    }

    pub(super) fn resume_listening(&mut self, epoch: Epoch) {
        if self.assistant_mut().is_some_and(|s| s.epoch == epoch) {
            self.start_listening();
        } else {
            tracing::trace!(epoch = %epoch, "assistant session gone, not listening");
        }
    }

    pub(super) fn on_transcript(&mut self, session_id: SessionId, text: &str, is_final: bool) {
        let Some(session) = self.assistant_mut().filter(|s| s.is_live(session_id)) else {
            tracing::trace!(session = %session_id, "transcript from closed session ignored");
            return;
        };

        let text = text.trim();
        if !is_final {
            self.set_status(&messages::heard(text));
            return;
        }
        if text.is_empty() {
            tracing::debug!(session = %session_id, "empty final transcript");
            return;
        }

        if let Some(handle) = session.recognition.take() {
            handle.stop();
        }
        session.phase = TurnPhase::Querying;
        session.silent = 0;
        session.turn = Some(SpeechTurn {
            transcript: text.to_string(),
            reply: None,
        });
        let epoch = session.epoch;

        tracing::info!(epoch = %epoch, chars = text.len(), "final transcript, querying assistant");
        self.set_status(messages::PROCESSING);
        self.spawn_query(epoch, text.to_string());
    }

    fn spawn_query(&self, epoch: Epoch, speech: String) {
        let assistant = Arc::clone(&self.services.assistant);
        let provider = Arc::clone(&self.services.location);
        let limit = self.settings.location_timeout;
        let tasks = self.tasks.clone();

        tokio::spawn(async move {
            let located = location::lookup(provider.as_ref(), limit).await;
            let request = AssistantRequest {
                speech,
                location_hint: located.hint().map(ToString::to_string),
            };
            let result = assistant.ask(request).await;
            if tasks
                .send(Event::AssistantReplied {
                    epoch,
                    location: located,
                    result,
                })
                .is_err()
            {
                tracing::debug!("controller gone, dropping assistant reply");
            }
        });
    }

    pub(super) fn on_assistant_replied(
        &mut self,
        epoch: Epoch,
        location: &LocationLookup,
        result: crate::Result<String>,
    ) {
        let reply = match result {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => messages::EMPTY_REPLY.to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "assistant request failed");
                messages::ASSISTANT_FAILED.to_string()
            }
        };

        let Some(session) = self
            .assistant_mut()
            .filter(|s| s.epoch == epoch && s.phase == TurnPhase::Querying)
        else {
            tracing::debug!(epoch = %epoch, "assistant reply no longer wanted");
            return;
        };
        session.phase = TurnPhase::Speaking;
        if let Some(turn) = session.turn.as_mut() {
            turn.reply = Some(reply.clone());
        }

        if let LocationLookup::Skipped(reason) = location {
            self.display.notice(reason.notice());
        }
        self.set_status(&reply);
        self.speak(&reply, Some(AfterSpeech::Listen(epoch)));
    }

    pub(super) fn on_recognition_error(&mut self, session_id: SessionId, kind: RecognitionErrorKind) {
        let Some(session) = self.assistant_mut().filter(|s| s.is_live(session_id)) else {
            tracing::trace!(session = %session_id, error = %kind, "error from closed session ignored");
            return;
        };
        if let Some(handle) = session.recognition.take() {
            handle.abort();
        }

        tracing::warn!(session = %session_id, error = %kind, "recognition error");
        self.recover(&kind);
    }

    pub(super) fn on_session_ended(&mut self, session_id: SessionId) {
        let max = self.settings.max_silent_sessions;
        let Some(session) = self.assistant_mut().filter(|s| s.is_live(session_id)) else {
            tracing::trace!(session = %session_id, "end of closed session ignored");
            return;
        };

        // Ended without a transcript or an error
        if let Some(handle) = session.recognition.take() {
            handle.finish();
        }
        session.silent += 1;
        let silent = session.silent;

        if silent >= max {
            tracing::info!(silent, "nothing heard repeatedly, ending assistant");
            self.end_assistant(messages::NOT_HEARD);
        } else {
            tracing::debug!(silent, "recognition ended silently, listening again");
            self.start_listening();
        }
    }

    /// Decide what follows a recognition failure
    fn recover(&mut self, kind: &RecognitionErrorKind) {
        match kind.disposition() {
            ErrorDisposition::EndSession | ErrorDisposition::Fatal => {
                self.end_assistant(kind.user_message());
            }
            // Retried errors never end the session
            ErrorDisposition::Retry => {
                let Some(session) = self.assistant_mut() else {
                    return;
                };
                session.phase = TurnPhase::Announcing;
                let epoch = session.epoch;

                let message = format!("{} {}", kind.user_message(), messages::TRY_AGAIN);
                self.set_status(&message);
                self.speak(&message, Some(AfterSpeech::Listen(epoch)));
            }
        }
    }

    /// Leave Assistant mode with an explanation instead of "Assistant off"
    fn end_assistant(&mut self, message: &str) {
        if !matches!(self.mode, ModeState::Assistant(_)) {
            return;
        }
        self.leave_mode();
        self.announce(message);
    }
}
