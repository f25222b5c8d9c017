//! Chat-model voice assistant

use async_trait::async_trait;
use secrecy::SecretString;

use super::{ChatClient, ChatMessage, ChatRequest, CompletionError, MessageContent};
use crate::agent::{Assistant, AssistantRequest};
use crate::{Error, Result};

/// Replies are spoken, so keep them short
const MAX_REPLY_TOKENS: u32 = 300;

/// Assistant backed by a chat completions model
pub struct ChatAssistant {
    chat: ChatClient,
    model: String,
    system_prompt: String,
}

impl ChatAssistant {
    /// Create a new assistant client
    ///
    /// # Errors
    ///
    /// Returns error if API key or base URL is missing
    pub fn new(base_url: &str, api_key: SecretString, model: String, system_prompt: String) -> Result<Self> {
        Ok(Self {
            chat: ChatClient::new(base_url, api_key)?,
            model,
            system_prompt,
        })
    }
}

/// User message text, with the location appended when known
fn user_content(request: &AssistantRequest) -> String {
    match &request.location_hint {
        Some(location) => format!(
            "User's speech: {}\nUser's current location: {location}",
            request.speech
        ),
        None => format!("User's speech: {}", request.speech),
    }
}

#[async_trait]
impl Assistant for ChatAssistant {
    async fn ask(&self, request: AssistantRequest) -> Result<String> {
        let content = user_content(&request);
        let chat_request = ChatRequest {
            model: &self.model,
            max_tokens: MAX_REPLY_TOKENS,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: MessageContent::Text(&self.system_prompt),
                },
                ChatMessage {
                    role: "user",
                    content: MessageContent::Text(&content),
                },
            ],
        };

        match self.chat.complete(&chat_request).await {
            Ok(reply) => {
                tracing::debug!(chars = reply.len(), "assistant replied");
                Ok(reply)
            }
            // An empty reply is answered with a rephrase prompt by the caller
            Err(CompletionError::Empty) => Ok(String::new()),
            Err(e) => Err(Error::Assistant(e.to_string())),
        }
    }
}
