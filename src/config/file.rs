//! TOML configuration file loading
//!
//! Supports `~/.config/assistive-visions/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VisionsConfigFile {
    /// Gesture timing and distance thresholds
    #[serde(default)]
    pub gestures: GesturesFileConfig,

    /// Camera detection loop
    #[serde(default)]
    pub detection: DetectionFileConfig,

    /// Voice assistant turn handling
    #[serde(default)]
    pub assistant: AssistantFileConfig,

    /// Model endpoints and credentials
    #[serde(default)]
    pub providers: ProvidersFileConfig,

    /// Camera source
    #[serde(default)]
    pub camera: CameraFileConfig,

    /// Fixed device location
    #[serde(default)]
    pub location: Option<LocationFileConfig>,
}

/// Gesture thresholds
#[derive(Debug, Default, Deserialize)]
pub struct GesturesFileConfig {
    /// Hold duration before a long press fires
    pub long_press_ms: Option<u64>,

    /// Maximum gap between the two taps of a double tap
    pub double_tap_ms: Option<u64>,

    /// Minimum upward travel for a swipe, in pixels
    pub swipe_min_distance: Option<f32>,

    /// Maximum sideways drift for a swipe, in pixels
    pub swipe_max_drift: Option<f32>,
}

/// Detection loop settings
#[derive(Debug, Default, Deserialize)]
pub struct DetectionFileConfig {
    pub interval_ms: Option<u64>,
    pub min_confidence: Option<f32>,
    pub camera_timeout_ms: Option<u64>,
}

/// Assistant settings
#[derive(Debug, Default, Deserialize)]
pub struct AssistantFileConfig {
    pub location_timeout_ms: Option<u64>,
    pub max_silent_sessions: Option<u32>,
    pub system_prompt: Option<String>,
}

/// Model provider settings
#[derive(Debug, Default, Deserialize)]
pub struct ProvidersFileConfig {
    /// OpenAI-compatible API base URL
    pub base_url: Option<String>,

    /// Model used for assistant replies (e.g. "gpt-4o-mini")
    pub chat_model: Option<String>,

    /// Model used for scene descriptions
    pub vision_model: Option<String>,

    /// Object detection endpoint
    pub detector_url: Option<String>,

    pub api_key: Option<String>,
}

/// Camera source settings
#[derive(Debug, Default, Deserialize)]
pub struct CameraFileConfig {
    /// Image file re-read on every capture
    pub image_path: Option<String>,
}

/// Fixed location reported to the assistant
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LocationFileConfig {
    pub latitude: f64,
    pub longitude: f64,
}

/// Parse a config file body
///
/// # Errors
///
/// Returns error if the content is not valid TOML for this schema
pub fn parse_config_file(content: &str) -> Result<VisionsConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load a config file that was explicitly requested
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed
pub fn load_config_file_from(path: &Path) -> Result<VisionsConfigFile> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let config = parse_config_file(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Load the TOML config file from the standard path
///
/// Returns `VisionsConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VisionsConfigFile {
    let Some(path) = config_file_path() else {
        return VisionsConfigFile::default();
    };

    if !path.exists() {
        return VisionsConfigFile::default();
    }

    match load_config_file_from(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            VisionsConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/assistive-visions/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.config_dir().join("assistive-visions").join("config.toml"))
}
