//! Assistive Visions - gesture and voice driven scene description
//!
//! A blind or low-vision user drives the app with a few touch gestures.
//! Double tap toggles the camera, which describes what it sees aloud.
//! Tap and hold toggles a voice assistant that listens, answers and
//! listens again. Only one of the two runs at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  Pointer input  │  Speech adapter  │  Task results   │
//! └────────┬────────┴────────┬─────────┴───────┬─────────┘
//!          │ gestures        │ speech events   │ epoch-tagged
//! ┌────────▼─────────────────▼─────────────────▼─────────┐
//! │                  Daemon (select loop)                │
//! │        Controller: Idle │ Camera │ Assistant         │
//! └────────┬─────────────────┬─────────────────┬─────────┘
//!          │                 │                 │
//!      Camera +          Describer         Assistant +
//!      Detector                            Location
//! ```

pub mod agent;
pub mod config;
pub mod controller;
pub mod daemon;
pub mod display;
pub mod error;
pub mod gesture;
pub mod location;
pub mod providers;
pub mod vision;
pub mod voice;

pub use config::Config;
pub use controller::{ApplicationMode, Controller, Event, ModeRequest, Services};
pub use daemon::{Daemon, Input};
pub use display::{Display, DisplayUpdate};
pub use error::{Error, Result};
pub use gesture::{GestureClassifier, GestureEvent, Point, PointerEvent};
