//! Model provider clients
//!
//! HTTP implementations of the assistant, scene describer and object
//! detector. The chat-based clients speak the OpenAI chat completions
//! protocol, which most hosted and local model servers accept.

mod assistant;
mod describer;
mod detector;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Error, Result};

pub use assistant::ChatAssistant;
pub use describer::VisionDescriber;
pub use detector::HttpDetector;

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

/// A message in the request
#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: MessageContent<'a>,
}

/// Plain text, or text and images
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

/// Content part (text or image)
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart<'a> {
    #[serde(rename = "text")]
    Text { text: &'a str },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

/// Image reference, here always a data URI
#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatResponse {
    /// Text of the first choice, trimmed; `None` if there is none
    fn into_text(self) -> Option<String> {
        self.choices
            .into_iter()
            .find_map(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
    }
}

/// Failure talking to a chat endpoint
#[derive(Debug, Error)]
enum CompletionError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Status { status: u16, body: String },

    #[error("empty response")]
    Empty,
}

/// Shared client for an OpenAI-compatible chat completions endpoint
struct ChatClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
}

impl ChatClient {
    fn new(base_url: &str, api_key: SecretString) -> Result<Self> {
        if api_key.expose_secret().trim().is_empty() {
            return Err(Error::Config("API key required for model provider".to_string()));
        }
        if base_url.trim().is_empty() {
            return Err(Error::Config("provider base URL is empty".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint: chat_completions_url(base_url),
            api_key,
        })
    }

    async fn complete(&self, request: &ChatRequest<'_>) -> std::result::Result<String, CompletionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let result: ChatResponse = response.json().await?;
        result.into_text().ok_or(CompletionError::Empty)
    }
}

/// `https://host/v1` -> `https://host/v1/chat/completions`
fn chat_completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}
