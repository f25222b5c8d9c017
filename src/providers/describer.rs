//! Vision-model scene describer

use async_trait::async_trait;
use base64::Engine;
use secrecy::SecretString;

use super::{ChatClient, ChatMessage, ChatRequest, CompletionError, ContentPart, ImageUrl, MessageContent};
use crate::Result;
use crate::vision::{DescribeError, DescribeRequest, SceneDescriber};

const MAX_DESCRIPTION_TOKENS: u32 = 400;

const SCENE_PROMPT: &str = "You are an expert at describing visual scenes for visually impaired users. \
Describe what you see: individual objects, their characteristics (color, texture, type if discernible), \
their approximate location in the frame (\"in the foreground\", \"on the left\", \"top-right corner\"), \
and any activities or interactions. If a person is visible, describe their apparent actions or posture, \
but avoid guessing emotions or identities. Prioritize what matters most to someone who cannot see the \
scene and keep it natural to listen to.";

/// Scene describer backed by a multimodal chat model
pub struct VisionDescriber {
    chat: ChatClient,
    model: String,
}

impl VisionDescriber {
    /// Create a new describer client
    ///
    /// # Errors
    ///
    /// Returns error if API key or base URL is missing
    pub fn new(base_url: &str, api_key: SecretString, model: String) -> Result<Self> {
        Ok(Self {
            chat: ChatClient::new(base_url, api_key)?,
            model,
        })
    }
}

/// Prompt text for one frame
fn scene_prompt(request: &DescribeRequest) -> String {
    let mut prompt = SCENE_PROMPT.to_string();

    let labels = request.detections.labels();
    if !labels.is_empty() {
        prompt.push_str(&format!(
            "\n\nAn object detector found: {}.",
            labels.join(", ")
        ));
    }

    if let Some(previous) = &request.previous_description {
        prompt.push_str(&format!(
            "\n\nThe previous description for a very similar scene was: \"{previous}\". \
If the current scene is substantially the same, acknowledge this briefly and focus on new or \
changed elements. If the scene is different, describe it fully."
        ));
    }

    prompt
}

fn data_uri(mime: &str, data: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(data);
    format!("data:{mime};base64,{encoded}")
}

#[async_trait]
impl SceneDescriber for VisionDescriber {
    async fn describe(&self, request: DescribeRequest) -> std::result::Result<String, DescribeError> {
        let prompt = scene_prompt(&request);
        let chat_request = ChatRequest {
            model: &self.model,
            max_tokens: MAX_DESCRIPTION_TOKENS,
            messages: vec![ChatMessage {
                role: "user",
                content: MessageContent::Parts(vec![
                    ContentPart::Text { text: &prompt },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: data_uri(&request.image.mime, &request.image.data),
                        },
                    },
                ]),
            }],
        };

        match self.chat.complete(&chat_request).await {
            Ok(description) => {
                tracing::debug!(description = %description, "scene described");
                Ok(description)
            }
            Err(CompletionError::Status { status, body }) => {
                Err(DescribeError::from_status(status, &body))
            }
            Err(CompletionError::Empty) => Err(DescribeError::EmptyResponse),
            Err(CompletionError::Request(e)) => Err(DescribeError::Transient(e.to_string())),
        }
    }
}
