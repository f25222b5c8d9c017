//! Mode controller
//!
//! Owns the single active mode (Idle, Camera or Assistant) and everything
//! that belongs to it. The live camera stream and the live recognition
//! session are carried inside the mode, so they can never both exist.
//!
//! The controller is an actor: all state changes happen in
//! [`Controller::handle`]. Slow collaborator calls run as spawned tasks and
//! report back through the event channel, tagged with the epoch of the
//! mode instance that issued them. Results from an earlier epoch are
//! dropped on arrival.

mod assistant;
mod detection;
pub mod messages;

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::agent::Assistant;
use crate::config::{Config, DetectionConfig};
use crate::display::{Display, DisplayUpdate};
use crate::gesture::GestureEvent;
use crate::location::{LocationLookup, LocationProvider};
use crate::vision::{
    CameraError, CameraSource, DescribeError, DetectionFrame, ObjectDetector, SceneDescriber,
    VideoFrame,
};
use crate::voice::{SpeechEvent, SpeechIo, UtteranceId};

pub use assistant::{SpeechTurn, TurnPhase};

use self::assistant::AssistantSession;
use self::detection::CameraSession;

/// Which interaction is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplicationMode {
    #[default]
    Idle,
    Camera,
    Assistant,
}

impl ApplicationMode {
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

impl fmt::Display for ApplicationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Camera => write!(f, "camera"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// Identifies one entry into Camera or Assistant mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Epoch(u64);

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Explicit mode change, e.g. from a button or the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeRequest {
    Camera,
    Assistant,
    Stop,
}

/// Everything the controller reacts to
#[derive(Debug)]
pub enum Event {
    Gesture(GestureEvent),
    Request(ModeRequest),
    Speech(SpeechEvent),

    /// Time to capture the next camera frame
    DetectionTick,

    /// Detection finished for a captured frame
    FrameDetected {
        epoch: Epoch,
        image: VideoFrame,
        detections: DetectionFrame,
    },

    /// Scene description finished
    SceneDescribed {
        epoch: Epoch,
        result: Result<String, DescribeError>,
    },

    /// Assistant query finished
    AssistantReplied {
        epoch: Epoch,
        location: LocationLookup,
        result: crate::Result<String>,
    },
}

/// External collaborators
#[derive(Clone)]
pub struct Services {
    pub camera: Arc<dyn CameraSource>,
    pub detector: Arc<dyn ObjectDetector>,
    pub describer: Arc<dyn SceneDescriber>,
    pub assistant: Arc<dyn Assistant>,
    pub location: Arc<dyn LocationProvider>,
}

/// Live state of the active mode
enum ModeState {
    Idle,
    Camera(CameraSession),
    Assistant(AssistantSession),
}

impl ModeState {
    const fn mode(&self) -> ApplicationMode {
        match self {
            Self::Idle => ApplicationMode::Idle,
            Self::Camera(_) => ApplicationMode::Camera,
            Self::Assistant(_) => ApplicationMode::Assistant,
        }
    }
}

/// What to do once the current utterance ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterSpeech {
    /// Listen again, if the same assistant session is still active
    Listen(Epoch),
}

/// The utterance currently being spoken
#[derive(Debug, Clone, Copy)]
struct Utterance {
    id: UtteranceId,
    then: Option<AfterSpeech>,
}

#[derive(Debug, Clone, Copy)]
struct Settings {
    detection: DetectionConfig,
    max_silent_sessions: u32,
    location_timeout: std::time::Duration,
}

impl Settings {
    const fn from_config(config: &Config) -> Self {
        Self {
            detection: config.detection,
            max_silent_sessions: config.assistant.max_silent_sessions,
            location_timeout: config.assistant.location_timeout,
        }
    }
}

/// Monotonic id sources
#[derive(Debug, Default)]
struct Counters {
    epoch: u64,
    utterance: u64,
    session: u64,
}

impl Counters {
    const fn next_epoch(&mut self) -> Epoch {
        self.epoch += 1;
        Epoch(self.epoch)
    }

    const fn next_utterance(&mut self) -> UtteranceId {
        self.utterance += 1;
        UtteranceId(self.utterance)
    }

    const fn next_session(&mut self) -> crate::voice::SessionId {
        self.session += 1;
        crate::voice::SessionId(self.session)
    }
}

/// Arbitrates modes and coordinates speech
pub struct Controller {
    mode: ModeState,
    speech: Arc<dyn SpeechIo>,
    services: Services,
    display: Display,
    tasks: mpsc::UnboundedSender<Event>,
    speaking: Option<Utterance>,
    status: String,
    settings: Settings,
    counters: Counters,
}

impl Controller {
    /// Create an idle controller
    ///
    /// Spawned collaborator calls report back on `tasks`; the receiver
    /// must feed its events into [`handle`](Self::handle).
    #[must_use]
    pub fn new(
        config: &Config,
        speech: Arc<dyn SpeechIo>,
        services: Services,
        display: Display,
        tasks: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            mode: ModeState::Idle,
            speech,
            services,
            display,
            tasks,
            speaking: None,
            status: String::new(),
            settings: Settings::from_config(config),
            counters: Counters::default(),
        }
    }

    #[must_use]
    pub const fn mode(&self) -> ApplicationMode {
        self.mode.mode()
    }

    /// Whether an utterance issued by the controller is in flight
    #[must_use]
    pub const fn is_speaking(&self) -> bool {
        self.speaking.is_some()
    }

    /// Current status line
    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Speak the greeting and usage hint
    pub fn welcome(&mut self) {
        self.announce(messages::WELCOME);
    }

    /// Process one event
    pub async fn handle(&mut self, event: Event) {
        match event {
            Event::Gesture(gesture) => self.handle_gesture(gesture).await,
            Event::Request(ModeRequest::Camera) => self.request_camera().await,
            Event::Request(ModeRequest::Assistant) => self.request_assistant(),
            Event::Request(ModeRequest::Stop) => self.stop(),
            Event::Speech(event) => self.on_speech_event(event),
            Event::DetectionTick => self.on_detection_tick(),
            Event::FrameDetected {
                epoch,
                image,
                detections,
            } => self.on_frame_detected(epoch, image, detections),
            Event::SceneDescribed { epoch, result } => self.on_scene_described(epoch, result),
            Event::AssistantReplied {
                epoch,
                location,
                result,
            } => self.on_assistant_replied(epoch, &location, result),
        }
    }

    /// Map a gesture to a mode transition or an interruption
    pub async fn handle_gesture(&mut self, gesture: GestureEvent) {
        tracing::debug!(gesture = %gesture, mode = %self.mode(), "gesture");

        match gesture {
            GestureEvent::DoubleTap => {
                if matches!(self.mode, ModeState::Camera(_)) {
                    self.stop();
                } else {
                    self.request_camera().await;
                }
            }
            GestureEvent::LongPressStart => {
                if matches!(self.mode, ModeState::Assistant(_)) {
                    self.stop();
                } else {
                    self.request_assistant();
                }
            }
            // Only the assistant's speech can be cut short
            GestureEvent::SingleTap | GestureEvent::SwipeUp => {
                if matches!(self.mode, ModeState::Assistant(_)) {
                    self.interrupt();
                }
            }
            GestureEvent::LongPressCancel => {}
        }
    }

    /// Enter Camera mode
    ///
    /// Rejected with a spoken message while the assistant is active. The
    /// camera is opened before this returns; on failure the controller
    /// stays idle and says why.
    pub async fn request_camera(&mut self) {
        match self.mode {
            ModeState::Camera(_) => {
                tracing::debug!("camera already active");
                return;
            }
            ModeState::Assistant(_) => {
                tracing::info!("camera requested while assistant active, rejecting");
                self.announce(messages::STOP_ASSISTANT_FIRST);
                return;
            }
            ModeState::Idle => {}
        }

        self.set_status(messages::INITIALIZING_CAMERA);
        let camera = Arc::clone(&self.services.camera);
        let opened =
            tokio::time::timeout(self.settings.detection.camera_timeout, camera.open()).await;

        match opened {
            Ok(Ok(stream)) => self.enter_camera(stream),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "camera unavailable");
                self.announce(e.user_message());
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.settings.detection.camera_timeout.as_millis(),
                    "camera start timed out"
                );
                self.announce(CameraError::Timeout.user_message());
            }
        }
    }

    /// Enter Assistant mode
    ///
    /// Rejected with a spoken message while the camera is active.
    pub fn request_assistant(&mut self) {
        match self.mode {
            ModeState::Assistant(_) => {
                tracing::debug!("assistant already active");
            }
            ModeState::Camera(_) => {
                tracing::info!("assistant requested while camera active, rejecting");
                self.announce(messages::STOP_CAMERA_FIRST);
            }
            ModeState::Idle => self.enter_assistant(),
        }
    }

    /// Return to Idle, releasing the active mode's resources
    ///
    /// Does nothing when already idle.
    pub fn stop(&mut self) {
        match self.leave_mode() {
            ApplicationMode::Idle => {}
            ApplicationMode::Camera => self.announce(messages::CAMERA_OFF),
            ApplicationMode::Assistant => self.announce(messages::ASSISTANT_OFF),
        }
    }

    /// Release everything without announcing
    pub fn shutdown(&mut self) {
        self.leave_mode();
        self.cancel_speech();
        tracing::info!("controller shut down");
    }

    /// Wait for the next detection tick; never resolves outside Camera mode
    pub async fn next_detection_tick(&mut self) {
        match &mut self.mode {
            ModeState::Camera(camera) => {
                camera.ticker.tick().await;
            }
            _ => std::future::pending::<()>().await,
        }
    }

    fn leave_mode(&mut self) -> ApplicationMode {
        let previous = std::mem::replace(&mut self.mode, ModeState::Idle);
        let left = previous.mode();

        match previous {
            ModeState::Idle => return left,
            ModeState::Camera(camera) => {
                // Dropping the session releases the stream and the ticker
                drop(camera);
                self.display.send(DisplayUpdate::ClearOverlay);
            }
            ModeState::Assistant(session) => {
                session.end();
                self.cancel_speech();
            }
        }

        tracing::info!(mode = %left, "mode left");
        self.display.send(DisplayUpdate::Mode(ApplicationMode::Idle));
        left
    }

    fn on_speech_event(&mut self, event: SpeechEvent) {
        match event {
            SpeechEvent::UtteranceEnded { id } => self.on_utterance_ended(id),
            SpeechEvent::Transcript {
                session,
                text,
                is_final,
            } => self.on_transcript(session, &text, is_final),
            SpeechEvent::RecognitionError { session, kind } => {
                self.on_recognition_error(session, kind);
            }
            SpeechEvent::SessionEnded { session } => self.on_session_ended(session),
        }
    }

    fn on_utterance_ended(&mut self, id: UtteranceId) {
        let Some(finished) = self.speaking.take_if(|u| u.id == id) else {
            tracing::trace!(utterance = %id, "ignoring end of superseded utterance");
            return;
        };
        tracing::debug!(utterance = %id, "utterance ended");

        if let Some(AfterSpeech::Listen(epoch)) = finished.then {
            self.resume_listening(epoch);
        }
    }

    /// Cut off the assistant's speech and go straight back to listening
    fn interrupt(&mut self) {
        if !self.is_speaking() {
            return;
        }
        tracing::info!("assistant speech interrupted");
        self.cancel_speech();
        self.start_listening();
    }

    /// Show `text` as the status and speak it
    fn announce(&mut self, text: &str) {
        self.set_status(text);
        self.speak(text, None);
    }

    fn set_status(&mut self, text: &str) {
        text.clone_into(&mut self.status);
        self.display.status(text);
    }

    /// Start an utterance, replacing any current one
    ///
    /// A replaced utterance's follow-up carries over unless the new one
    /// has its own, so an interjection cannot strand the assistant. A live
    /// recognition session is paused for the duration.
    fn speak(&mut self, text: &str, then: Option<AfterSpeech>) {
        let inherited = self.speaking.take().and_then(|u| u.then);
        let paused = self.pause_listening();
        let id = self.counters.next_utterance();

        self.speaking = Some(Utterance {
            id,
            then: then.or(inherited).or(paused),
        });
        tracing::debug!(utterance = %id, chars = text.len(), "speaking");
        self.speech.speak(id, text);
    }

    fn cancel_speech(&mut self) {
        if let Some(utterance) = self.speaking.take() {
            tracing::debug!(utterance = %utterance.id, "cancelling speech");
            self.speech.cancel_speech();
        }
    }
}
