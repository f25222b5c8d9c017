//! Main event loop
//!
//! Feeds pointer input through the gesture classifier and multiplexes
//! gestures, speech events, task results and detection ticks into the
//! controller, one at a time.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::Config;
use crate::controller::{Controller, Event, ModeRequest, Services};
use crate::display::Display;
use crate::gesture::{GestureClassifier, GestureEvent, PointerEvent};
use crate::voice::{SpeechEvent, SpeechIo};

/// Input from the user's surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Input {
    /// Raw pointer event, classified into gestures here
    Pointer(PointerEvent),
    /// Already classified gesture
    Gesture(GestureEvent),
    /// Explicit mode change
    Request(ModeRequest),
}

/// The running application
pub struct Daemon {
    controller: Controller,
    classifier: GestureClassifier,
    inputs: mpsc::Receiver<Input>,
    speech_events: mpsc::UnboundedReceiver<SpeechEvent>,
    tasks: mpsc::UnboundedReceiver<Event>,
}

impl Daemon {
    /// Wire a controller to its event sources
    ///
    /// `speech_events` must receive what the `speech` adapter reports.
    /// Returns the daemon and the sender for user input; the loop ends
    /// once every input sender is dropped.
    #[must_use]
    pub fn new(
        config: &Config,
        speech: Arc<dyn SpeechIo>,
        speech_events: mpsc::UnboundedReceiver<SpeechEvent>,
        services: Services,
        display: Display,
    ) -> (Self, mpsc::Sender<Input>) {
        let (input_tx, inputs) = mpsc::channel(64);
        let (task_tx, tasks) = mpsc::unbounded_channel();

        let daemon = Self {
            controller: Controller::new(config, speech, services, display, task_tx),
            classifier: GestureClassifier::new(config.gestures),
            inputs,
            speech_events,
            tasks,
        };
        (daemon, input_tx)
    }

    #[must_use]
    pub const fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Run until input closes or `shutdown` resolves
    ///
    /// Speaks the welcome first. On exit the active mode is released and
    /// speech is cancelled.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        tracing::info!("visions daemon started");
        self.controller.welcome();

        loop {
            let deadline = self.classifier.next_deadline();

            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                input = self.inputs.recv() => {
                    let Some(input) = input else {
                        tracing::info!("input closed");
                        break;
                    };
                    self.on_input(input).await;
                }
                Some(event) = self.speech_events.recv() => {
                    self.controller.handle(Event::Speech(event)).await;
                }
                Some(event) = self.tasks.recv() => {
                    self.controller.handle(event).await;
                }
                () = sleep_until(deadline) => {
                    let gestures = self.classifier.poll(Instant::now());
                    self.dispatch(gestures).await;
                }
                () = self.controller.next_detection_tick() => {
                    self.controller.handle(Event::DetectionTick).await;
                }
            }
        }

        self.controller.shutdown();
        tracing::info!("visions daemon stopped");
    }

    async fn on_input(&mut self, input: Input) {
        match input {
            Input::Pointer(pointer) => {
                let gestures = self.classifier.feed(pointer, Instant::now());
                self.dispatch(gestures).await;
            }
            Input::Gesture(gesture) => self.controller.handle(Event::Gesture(gesture)).await,
            Input::Request(request) => self.controller.handle(Event::Request(request)).await,
        }
    }

    async fn dispatch(&mut self, gestures: Vec<GestureEvent>) {
        for gesture in gestures {
            self.controller.handle(Event::Gesture(gesture)).await;
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
