//! Configuration management for Assistive Visions
//!
//! Precedence is env > toml > default. The file layer lives in [`file`].

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;

use crate::location::Coordinates;
use crate::{Error, Result};

use self::file::VisionsConfigFile;

/// Default OpenAI-compatible endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Persona instructions for the voice assistant
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are \"Vision Buddy\", a friendly and helpful voice \
assistant for the Assistive Visions app, designed to help users who may have visual impairments. \
Respond clearly, concisely, and empathetically, in a few sentences that read well aloud. \
If the user's location is provided and relevant to their query, use it to give a more helpful answer.";

/// Assistive Visions configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Gesture thresholds
    pub gestures: GestureConfig,

    /// Camera detection loop
    pub detection: DetectionConfig,

    /// Assistant turn handling
    pub assistant: AssistantConfig,

    /// Model endpoints and credentials
    pub providers: ProviderConfig,

    /// Image file used as the camera, if any
    pub camera_image: Option<PathBuf>,

    /// Fixed location shared with the assistant, if any
    pub location: Option<Coordinates>,
}

/// Timing and distance thresholds for the gesture classifier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureConfig {
    /// Hold duration before a long press fires
    pub long_press: Duration,

    /// Maximum gap between two taps to count as a double tap
    pub double_tap: Duration,

    /// Minimum upward travel for a swipe, in pixels
    pub swipe_min_distance: f32,

    /// Maximum horizontal drift for a swipe, in pixels
    pub swipe_max_drift: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            long_press: Duration::from_millis(700),
            double_tap: Duration::from_millis(300),
            swipe_min_distance: 50.0,
            swipe_max_drift: 75.0,
        }
    }
}

/// Camera detection loop configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionConfig {
    /// Time between frame captures
    pub interval: Duration,

    /// Detections below this confidence are dropped
    pub min_confidence: f32,

    /// How long to wait for the camera to start
    pub camera_timeout: Duration,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            min_confidence: 0.5,
            camera_timeout: Duration::from_secs(10),
        }
    }
}

/// Assistant turn configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantConfig {
    /// Upper bound on the location lookup before a query is sent without it
    pub location_timeout: Duration,

    /// Listening sessions in a row that end with nothing heard before the
    /// assistant gives up
    pub max_silent_sessions: u32,

    /// Instructions sent with every assistant request
    pub system_prompt: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            location_timeout: Duration::from_secs(5),
            max_silent_sessions: 3,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Model provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// OpenAI-compatible API base URL
    pub base_url: String,

    /// Model used for assistant replies
    pub chat_model: String,

    /// Model used for scene descriptions
    pub vision_model: String,

    /// Object detection endpoint
    pub detector_url: Option<String>,

    /// API key for the chat and vision models
    pub api_key: Option<SecretString>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            vision_model: "gpt-4o-mini".to_string(),
            detector_url: None,
            api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from the standard file location and the environment
    ///
    /// # Errors
    ///
    /// Returns error if the resulting configuration is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Load configuration from an explicit file and the environment
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed, or the
    /// resulting configuration is invalid
    pub fn load_from(path: &Path) -> Result<Self> {
        let fc = file::load_config_file_from(path)?;
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a threshold is out of range
    pub fn from_sources(fc: VisionsConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let gestures = GestureConfig {
            long_press: fc
                .gestures
                .long_press_ms
                .map_or(defaults.gestures.long_press, Duration::from_millis),
            double_tap: fc
                .gestures
                .double_tap_ms
                .map_or(defaults.gestures.double_tap, Duration::from_millis),
            swipe_min_distance: fc
                .gestures
                .swipe_min_distance
                .unwrap_or(defaults.gestures.swipe_min_distance),
            swipe_max_drift: fc
                .gestures
                .swipe_max_drift
                .unwrap_or(defaults.gestures.swipe_max_drift),
        };

        let detection = DetectionConfig {
            interval: fc
                .detection
                .interval_ms
                .map_or(defaults.detection.interval, Duration::from_millis),
            min_confidence: fc
                .detection
                .min_confidence
                .unwrap_or(defaults.detection.min_confidence),
            camera_timeout: fc
                .detection
                .camera_timeout_ms
                .map_or(defaults.detection.camera_timeout, Duration::from_millis),
        };

        let assistant = AssistantConfig {
            location_timeout: fc
                .assistant
                .location_timeout_ms
                .map_or(defaults.assistant.location_timeout, Duration::from_millis),
            max_silent_sessions: fc
                .assistant
                .max_silent_sessions
                .unwrap_or(defaults.assistant.max_silent_sessions),
            system_prompt: fc
                .assistant
                .system_prompt
                .unwrap_or(defaults.assistant.system_prompt),
        };

        // Load API keys (env > toml > None)
        let providers = ProviderConfig {
            base_url: env("VISIONS_API_BASE_URL")
                .or(fc.providers.base_url)
                .unwrap_or(defaults.providers.base_url),
            chat_model: env("VISIONS_CHAT_MODEL")
                .or(fc.providers.chat_model)
                .unwrap_or(defaults.providers.chat_model),
            vision_model: env("VISIONS_VISION_MODEL")
                .or(fc.providers.vision_model)
                .unwrap_or(defaults.providers.vision_model),
            detector_url: env("VISIONS_DETECTOR_URL").or(fc.providers.detector_url),
            api_key: env("OPENAI_API_KEY")
                .or(fc.providers.api_key)
                .filter(|key| !key.trim().is_empty())
                .map(SecretString::from),
        };

        let camera_image = env("VISIONS_CAMERA_IMAGE")
            .or(fc.camera.image_path)
            .map(PathBuf::from);

        let location = fc.location.map(|l| Coordinates {
            latitude: l.latitude,
            longitude: l.longitude,
        });

        let config = Self {
            gestures,
            detection,
            assistant,
            providers,
            camera_image,
            location,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that every threshold is usable
    ///
    /// # Errors
    ///
    /// Returns error naming the first invalid setting
    pub fn validate(&self) -> Result<()> {
        let durations = [
            ("gestures.long_press_ms", self.gestures.long_press),
            ("gestures.double_tap_ms", self.gestures.double_tap),
            ("detection.interval_ms", self.detection.interval),
            ("detection.camera_timeout_ms", self.detection.camera_timeout),
            ("assistant.location_timeout_ms", self.assistant.location_timeout),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
            return Err(Error::Config(format!("{name} must be greater than zero")));
        }

        if !(0.0..=1.0).contains(&self.detection.min_confidence) {
            return Err(Error::Config(format!(
                "detection.min_confidence must be between 0 and 1, got {}",
                self.detection.min_confidence
            )));
        }

        if self.gestures.swipe_min_distance <= 0.0 || self.gestures.swipe_max_drift <= 0.0 {
            return Err(Error::Config(
                "gesture swipe distances must be positive".to_string(),
            ));
        }

        if self.assistant.max_silent_sessions == 0 {
            return Err(Error::Config(
                "assistant.max_silent_sessions must be at least 1".to_string(),
            ));
        }

        if let Some(location) = self.location
            && !location.is_valid()
        {
            return Err(Error::Config(format!(
                "location out of range: {location}"
            )));
        }

        Ok(())
    }
}
