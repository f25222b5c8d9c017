//! User-facing phrases
//!
//! Every string here is both spoken and shown. Error phrases for specific
//! failure kinds live next to those kinds (`CameraError::user_message`,
//! `RecognitionErrorKind::user_message`, `DescribeError::user_message`).

pub const WELCOME: &str = "Welcome to Assistive Visions. Double tap the screen to identify objects. \
Tap and hold to speak to your personal assistant.";

pub const INITIALIZING_CAMERA: &str = "Initializing camera...";
pub const CAMERA_ACTIVE: &str = "Camera active. Point to objects. Double tap to stop.";
pub const CAMERA_OFF: &str = "Camera off. Double tap for camera, tap & hold for assistant.";

pub const LISTENING: &str = "Listening...";
pub const PROCESSING: &str = "Processing your request...";
pub const ASSISTANT_OFF: &str = "Assistant off. Double tap for camera, tap & hold for assistant.";

pub const STOP_ASSISTANT_FIRST: &str = "Please stop the assistant first before using the camera.";
pub const STOP_CAMERA_FIRST: &str = "Please stop the camera first before using the assistant.";

pub const ASSISTANT_FAILED: &str = "Sorry, I couldn't process that. Please try again.";
pub const EMPTY_REPLY: &str = "I'm sorry, I didn't quite understand that. Could you please rephrase?";
pub const NOT_HEARD: &str = "Didn't catch that. Tap and hold to try again.";

/// Suffix for recognition errors that are retried
pub const TRY_AGAIN: &str = "Please try again.";

/// Status line for an interim transcript
#[must_use]
pub fn heard(text: &str) -> String {
    format!("Heard: \"{text}\"...")
}
