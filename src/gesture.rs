//! Gesture classification
//!
//! Turns raw pointer down/move/up events into high-level gestures. The
//! classifier is a pure state machine: callers pass the current time to
//! every call and sleep until [`GestureClassifier::next_deadline`] to let
//! pending taps and holds resolve.

use std::fmt;

use tokio::time::Instant;

use crate::config::GestureConfig;

/// Screen position in pixels, y growing downward
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance(self, other: Self) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Raw pointer input
///
/// Coordinates are optional because some input sources (keyboard
/// activation, screen readers) report presses without a position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(Option<Point>),
    Move(Point),
    Up(Option<Point>),
}

/// Classified gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureEvent {
    /// A tap with no second tap inside the double-tap window
    SingleTap,
    /// Two taps inside the double-tap window
    DoubleTap,
    /// The pointer has been held past the long-press threshold
    LongPressStart,
    /// A held pointer was released
    LongPressCancel,
    /// Quick upward flick
    SwipeUp,
}

impl fmt::Display for GestureEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SingleTap => write!(f, "single-tap"),
            Self::DoubleTap => write!(f, "double-tap"),
            Self::LongPressStart => write!(f, "long-press-start"),
            Self::LongPressCancel => write!(f, "long-press-cancel"),
            Self::SwipeUp => write!(f, "swipe-up"),
        }
    }
}

/// A pointer that is currently down
#[derive(Debug, Clone, Copy)]
struct Press {
    origin: Option<Point>,
    last: Option<Point>,
    /// When the hold fires; `None` once fired or disarmed
    hold_at: Option<Instant>,
    held: bool,
    dragged: bool,
}

/// Classifies pointer input into gestures
#[derive(Debug)]
pub struct GestureClassifier {
    config: GestureConfig,
    press: Option<Press>,
    /// Release time of a tap still waiting for a possible second tap
    pending_tap: Option<Instant>,
}

impl GestureClassifier {
    /// Create a classifier with the given thresholds
    #[must_use]
    pub const fn new(config: GestureConfig) -> Self {
        Self {
            config,
            press: None,
            pending_tap: None,
        }
    }

    /// Whether a pointer is currently down
    #[must_use]
    pub const fn is_pressed(&self) -> bool {
        self.press.is_some()
    }

    /// Process one pointer event
    ///
    /// Deadlines that passed before `now` are resolved first, so the
    /// returned gestures are in the order they happened.
    pub fn feed(&mut self, event: PointerEvent, now: Instant) -> Vec<GestureEvent> {
        let mut gestures = self.poll(now);

        match event {
            PointerEvent::Down(position) => {
                if self.press.is_some() {
                    tracing::trace!("second pointer down ignored");
                } else {
                    self.press = Some(Press {
                        origin: position,
                        last: position,
                        hold_at: Some(now + self.config.long_press),
                        held: false,
                        dragged: false,
                    });
                }
            }
            PointerEvent::Move(position) => {
                if let Some(press) = self.press.as_mut() {
                    press.last = Some(position);
                    Self::track_drag(press, self.config.swipe_min_distance);
                }
            }
            PointerEvent::Up(position) => {
                if let Some(mut press) = self.press.take() {
                    if position.is_some() {
                        press.last = position;
                    }
                    Self::track_drag(&mut press, self.config.swipe_min_distance);
                    gestures.extend(self.release(press, now));
                }
            }
        }

        gestures
    }

    /// Resolve deadlines that have passed
    pub fn poll(&mut self, now: Instant) -> Vec<GestureEvent> {
        let mut gestures = Vec::new();

        if let Some(press) = self.press.as_mut()
            && press.hold_at.is_some_and(|at| now >= at)
        {
            press.hold_at = None;
            press.held = true;
            // A hold consumes the interaction, including a tap waiting for its pair
            self.pending_tap = None;
            gestures.push(GestureEvent::LongPressStart);
        }

        if self
            .pending_tap
            .is_some_and(|tapped| now >= tapped + self.config.double_tap)
        {
            self.pending_tap = None;
            gestures.push(GestureEvent::SingleTap);
        }

        gestures
    }

    /// Earliest time at which [`poll`](Self::poll) may produce a gesture
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        let hold = self.press.and_then(|p| p.hold_at);
        let tap = self.pending_tap.map(|t| t + self.config.double_tap);
        match (hold, tap) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Forget any in-progress interaction
    pub fn reset(&mut self) {
        self.press = None;
        self.pending_tap = None;
    }

    fn track_drag(press: &mut Press, threshold: f32) {
        if let (Some(origin), Some(last)) = (press.origin, press.last)
            && origin.distance(last) > threshold
        {
            press.dragged = true;
            press.hold_at = None;
        }
    }

    fn release(&mut self, press: Press, now: Instant) -> Option<GestureEvent> {
        if press.held {
            return Some(GestureEvent::LongPressCancel);
        }

        if self.is_swipe_up(&press) {
            self.pending_tap = None;
            return Some(GestureEvent::SwipeUp);
        }

        if press.dragged {
            tracing::trace!("drag released without gesture");
            return None;
        }

        // Expired taps were flushed by `poll` before this point
        if self.pending_tap.take().is_some() {
            Some(GestureEvent::DoubleTap)
        } else {
            self.pending_tap = Some(now);
            None
        }
    }

    fn is_swipe_up(&self, press: &Press) -> bool {
        let (Some(origin), Some(last)) = (press.origin, press.last) else {
            return false;
        };
        let rise = origin.y - last.y;
        let drift = (origin.x - last.x).abs();
        rise > self.config.swipe_min_distance && drift < self.config.swipe_max_drift
    }
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}
