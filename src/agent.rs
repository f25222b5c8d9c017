//! Voice assistant collaborator

use async_trait::async_trait;

use crate::{Error, Result};

/// One question for the assistant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantRequest {
    /// What the user said
    pub speech: String,
    /// Coarse location, e.g. "Lat: 40.71, Lon: -74.01"
    pub location_hint: Option<String>,
}

/// Answers spoken questions
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Get a reply to speak back
    ///
    /// # Errors
    ///
    /// Returns error if the model cannot be reached or replies with garbage
    async fn ask(&self, request: AssistantRequest) -> Result<String>;
}

/// Assistant used when no model is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredAssistant;

#[async_trait]
impl Assistant for UnconfiguredAssistant {
    async fn ask(&self, _request: AssistantRequest) -> Result<String> {
        Err(Error::Config(
            "no assistant configured; set OPENAI_API_KEY".to_string(),
        ))
    }
}
