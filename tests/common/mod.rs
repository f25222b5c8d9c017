//! Shared test utilities
//!
//! Scriptable collaborators and a harness that drives a [`Controller`]
//! the way the daemon does, one event at a time.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Semaphore, mpsc};

use assistive_visions::agent::{Assistant, AssistantRequest};
use assistive_visions::location::{LocationProvider, NoLocation};
use assistive_visions::vision::{
    BoundingBox, CameraError, CameraSource, CameraStream, DescribeError, DescribeRequest,
    DetectedObject, LabelDescriber, ObjectDetector, SceneDescriber, VideoFrame,
};
use assistive_visions::voice::{
    RecognitionErrorKind, SessionId, SpeechEvent, SpeechEvents, SpeechIo, UtteranceId,
};
use assistive_visions::{
    ApplicationMode, Config, Controller, Display, DisplayUpdate, Error, Event, GestureEvent,
    Services,
};

/// Calls made on the speech adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechCall {
    Speak(UtteranceId, String),
    CancelSpeech,
    Start(SessionId),
    Stop(SessionId),
    Abort(SessionId),
}

#[derive(Default)]
struct SpeechState {
    calls: Vec<SpeechCall>,
    speaking: Option<UtteranceId>,
    listening: Option<SessionId>,
    /// Starts while a session was open, or speech and recognition at once
    violations: Vec<String>,
    refuse: Option<RecognitionErrorKind>,
    start_attempts: usize,
}

/// Speech adapter that only finishes utterances when told to
pub struct MockSpeech {
    state: Mutex<SpeechState>,
    events: SpeechEvents,
}

impl MockSpeech {
    pub fn new(events: SpeechEvents) -> Self {
        Self {
            state: Mutex::new(SpeechState::default()),
            events,
        }
    }

    /// Make every following `start_recognition` fail with `kind`
    pub fn refuse_recognition(&self, kind: RecognitionErrorKind) {
        self.state.lock().unwrap().refuse = Some(kind);
    }

    pub fn calls(&self) -> Vec<SpeechCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SpeechCall::Speak(_, text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn starts(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, SpeechCall::Start(_)))
            .count()
    }

    pub fn start_attempts(&self) -> usize {
        self.state.lock().unwrap().start_attempts
    }

    pub fn violations(&self) -> Vec<String> {
        self.state.lock().unwrap().violations.clone()
    }

    pub fn is_speaking(&self) -> bool {
        self.state.lock().unwrap().speaking.is_some()
    }

    pub fn listening(&self) -> Option<SessionId> {
        self.state.lock().unwrap().listening
    }

    /// Finish the current utterance, as if playback completed
    pub fn finish_utterance(&self) -> bool {
        let finished = self.state.lock().unwrap().speaking.take();
        if let Some(id) = finished {
            self.events.send(SpeechEvent::UtteranceEnded { id }).unwrap();
        }
        finished.is_some()
    }

    /// Deliver a transcript to the open session
    pub fn hear(&self, text: &str, is_final: bool) {
        let session = self.listening().expect("no recognition session open");
        self.events
            .send(SpeechEvent::Transcript {
                session,
                text: text.to_string(),
                is_final,
            })
            .unwrap();
    }

    /// Fail the open session
    pub fn fail(&self, kind: RecognitionErrorKind) {
        let session = self
            .state
            .lock()
            .unwrap()
            .listening
            .take()
            .expect("no recognition session open");
        self.events
            .send(SpeechEvent::RecognitionError { session, kind })
            .unwrap();
        self.events.send(SpeechEvent::SessionEnded { session }).unwrap();
    }

    /// End the open session without a result
    pub fn end_silently(&self) {
        let session = self
            .state
            .lock()
            .unwrap()
            .listening
            .take()
            .expect("no recognition session open");
        self.events.send(SpeechEvent::SessionEnded { session }).unwrap();
    }
}

impl SpeechIo for MockSpeech {
    fn speak(&self, id: UtteranceId, text: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(session) = state.listening {
            state
                .violations
                .push(format!("spoke {text:?} while {session} was listening"));
        }
        if let Some(previous) = state.speaking.replace(id) {
            let _ = self.events.send(SpeechEvent::UtteranceEnded { id: previous });
        }
        state.calls.push(SpeechCall::Speak(id, text.to_string()));
    }

    fn cancel_speech(&self) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(SpeechCall::CancelSpeech);
        if let Some(id) = state.speaking.take() {
            let _ = self.events.send(SpeechEvent::UtteranceEnded { id });
        }
    }

    fn start_recognition(&self, session: SessionId) -> Result<(), RecognitionErrorKind> {
        let mut state = self.state.lock().unwrap();
        state.start_attempts += 1;
        if let Some(kind) = &state.refuse {
            return Err(kind.clone());
        }
        if let Some(open) = state.listening {
            state
                .violations
                .push(format!("started {session} while {open} was open"));
        }
        if let Some(id) = state.speaking {
            state
                .violations
                .push(format!("started {session} while {id} was speaking"));
        }
        state.listening = Some(session);
        state.calls.push(SpeechCall::Start(session));
        Ok(())
    }

    fn stop_recognition(&self, session: SessionId) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(SpeechCall::Stop(session));
        if state.listening == Some(session) {
            state.listening = None;
            let _ = self.events.send(SpeechEvent::SessionEnded { session });
        }
    }

    fn abort_recognition(&self, session: SessionId) {
        let mut state = self.state.lock().unwrap();
        state.calls.push(SpeechCall::Abort(session));
        if state.listening == Some(session) {
            state.listening = None;
        }
    }
}

pub const FRAME_WIDTH: u32 = 640;
pub const FRAME_HEIGHT: u32 = 480;

pub fn frame() -> VideoFrame {
    VideoFrame {
        data: vec![0xFF, 0xD8, 0xFF],
        mime: "image/jpeg".to_string(),
        width: FRAME_WIDTH,
        height: FRAME_HEIGHT,
    }
}

/// A centered detection
pub fn object(label: &str, confidence: f32) -> DetectedObject {
    DetectedObject {
        label: label.to_string(),
        confidence,
        bbox: BoundingBox {
            x: 270.0,
            y: 190.0,
            width: 100.0,
            height: 100.0,
        },
    }
}

/// Camera whose streams count themselves while open
#[derive(Default)]
pub struct MockCamera {
    live: Arc<AtomicUsize>,
    opened: AtomicUsize,
    failure: Mutex<Option<CameraError>>,
    hang: AtomicBool,
}

impl MockCamera {
    pub fn fail_with(&self, error: CameraError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    /// Never finish opening
    pub fn hang(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    /// Streams opened and not yet released
    pub fn live_streams(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn times_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

struct MockStream {
    live: Arc<AtomicUsize>,
}

impl CameraStream for MockStream {
    fn capture(&mut self) -> Result<VideoFrame, CameraError> {
        Ok(frame())
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CameraSource for MockCamera {
    async fn open(&self) -> Result<Box<dyn CameraStream>, CameraError> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockStream {
            live: Arc::clone(&self.live),
        }))
    }
}

/// Detector returning a fixed list
#[derive(Default)]
pub struct MockDetector {
    objects: Mutex<Vec<DetectedObject>>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockDetector {
    pub fn set_objects(&self, objects: Vec<DetectedObject>) {
        *self.objects.lock().unwrap() = objects;
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectDetector for MockDetector {
    async fn detect(&self, _frame: &VideoFrame) -> assistive_visions::Result<Vec<DetectedObject>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Detection("model unreachable".to_string()));
        }
        Ok(self.objects.lock().unwrap().clone())
    }
}

/// Describer that can be held until released
///
/// Scripted replies are used first; after that it describes by label.
pub struct MockDescriber {
    replies: Mutex<VecDeque<Result<String, DescribeError>>>,
    gate: Semaphore,
    gated: AtomicBool,
    calls: AtomicUsize,
    requests: Mutex<Vec<DescribeRequest>>,
}

impl Default for MockDescriber {
    fn default() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            gate: Semaphore::new(0),
            gated: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl MockDescriber {
    pub fn reply(&self, result: Result<String, DescribeError>) {
        self.replies.lock().unwrap().push_back(result);
    }

    /// Hold every description until [`release`](Self::release)
    pub fn hold(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    /// Let `n` held descriptions finish
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<DescribeRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SceneDescriber for MockDescriber {
    async fn describe(&self, request: DescribeRequest) -> Result<String, DescribeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if self.gated.load(Ordering::SeqCst) {
            self.gate.acquire().await.unwrap().forget();
        }

        let scripted = self.replies.lock().unwrap().pop_front();
        match scripted {
            Some(result) => result,
            None => LabelDescriber.describe(request).await,
        }
    }
}

/// Assistant with scripted replies; `None` scripts a failure
pub struct MockAssistant {
    replies: Mutex<VecDeque<Option<String>>>,
    gate: Semaphore,
    gated: AtomicBool,
    requests: Mutex<Vec<AssistantRequest>>,
}

impl Default for MockAssistant {
    fn default() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            gate: Semaphore::new(0),
            gated: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }
}

impl MockAssistant {
    pub fn reply(&self, reply: Option<&str>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(reply.map(ToString::to_string));
    }

    pub fn hold(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn requests(&self) -> Vec<AssistantRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Assistant for MockAssistant {
    async fn ask(&self, request: AssistantRequest) -> assistive_visions::Result<String> {
        self.requests.lock().unwrap().push(request);
        if self.gated.load(Ordering::SeqCst) {
            self.gate.acquire().await.unwrap().forget();
        }

        let scripted = self.replies.lock().unwrap().pop_front();
        match scripted {
            Some(Some(text)) => Ok(text),
            Some(None) => Err(Error::Assistant("upstream 503".to_string())),
            None => Ok("Here is my answer.".to_string()),
        }
    }
}

/// A controller wired to mocks, driven the way the daemon drives it
pub struct Harness {
    pub controller: Controller,
    pub speech: Arc<MockSpeech>,
    pub camera: Arc<MockCamera>,
    pub detector: Arc<MockDetector>,
    pub describer: Arc<MockDescriber>,
    pub assistant: Arc<MockAssistant>,
    speech_rx: mpsc::UnboundedReceiver<SpeechEvent>,
    tasks_rx: mpsc::UnboundedReceiver<Event>,
    display_rx: mpsc::UnboundedReceiver<DisplayUpdate>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        Self::with_location(config, Arc::new(NoLocation))
    }

    pub fn with_location(config: &Config, location: Arc<dyn LocationProvider>) -> Self {
        let (speech_tx, speech_rx) = mpsc::unbounded_channel();
        let (task_tx, tasks_rx) = mpsc::unbounded_channel();
        let (display, display_rx) = Display::channel();

        let speech = Arc::new(MockSpeech::new(speech_tx));
        let camera = Arc::new(MockCamera::default());
        let detector = Arc::new(MockDetector::default());
        let describer = Arc::new(MockDescriber::default());
        let assistant = Arc::new(MockAssistant::default());

        let services = Services {
            camera: camera.clone(),
            detector: detector.clone(),
            describer: describer.clone(),
            assistant: assistant.clone(),
            location,
        };
        let controller = Controller::new(config, speech.clone(), services, display, task_tx);

        Self {
            controller,
            speech,
            camera,
            detector,
            describer,
            assistant,
            speech_rx,
            tasks_rx,
            display_rx,
        }
    }

    /// Handle everything queued, letting spawned work run in between
    pub async fn settle(&mut self) {
        loop {
            for _ in 0..16 {
                tokio::task::yield_now().await;
            }
            if let Ok(event) = self.speech_rx.try_recv() {
                self.controller.handle(Event::Speech(event)).await;
                continue;
            }
            if let Ok(event) = self.tasks_rx.try_recv() {
                self.controller.handle(event).await;
                continue;
            }
            break;
        }
    }

    pub async fn gesture(&mut self, gesture: GestureEvent) {
        self.controller.handle(Event::Gesture(gesture)).await;
        self.settle().await;
    }

    pub async fn tick(&mut self) {
        self.controller.handle(Event::DetectionTick).await;
        self.settle().await;
    }

    /// Finish the current utterance and handle what follows
    pub async fn finish_speaking(&mut self) {
        assert!(self.speech.finish_utterance(), "nothing was being spoken");
        self.settle().await;
    }

    pub async fn hear(&mut self, text: &str) {
        self.speech.hear(text, true);
        self.settle().await;
    }

    pub async fn hear_interim(&mut self, text: &str) {
        self.speech.hear(text, false);
        self.settle().await;
    }

    pub async fn recognition_error(&mut self, kind: RecognitionErrorKind) {
        self.speech.fail(kind);
        self.settle().await;
    }

    pub async fn end_silently(&mut self) {
        self.speech.end_silently();
        self.settle().await;
    }

    /// Enter Camera mode and let the activation message finish
    pub async fn start_camera(&mut self) {
        self.gesture(GestureEvent::DoubleTap).await;
        assert_eq!(self.controller.mode(), ApplicationMode::Camera);
        self.finish_speaking().await;
    }

    /// Enter Assistant mode and let "Listening..." finish
    pub async fn start_assistant(&mut self) {
        self.gesture(GestureEvent::LongPressStart).await;
        assert_eq!(self.controller.mode(), ApplicationMode::Assistant);
        self.finish_speaking().await;
        assert!(self.speech.listening().is_some(), "should be listening");
    }

    pub fn spoken(&self) -> Vec<String> {
        self.speech.spoken()
    }

    pub fn last_spoken(&self) -> Option<String> {
        self.spoken().pop()
    }

    /// Display updates since the last call
    pub fn display_updates(&mut self) -> Vec<DisplayUpdate> {
        std::iter::from_fn(|| self.display_rx.try_recv().ok()).collect()
    }

    pub fn assert_no_violations(&self) {
        let violations = self.speech.violations();
        assert!(violations.is_empty(), "speech violations: {violations:?}");
    }
}

/// Let virtual time pass
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}
