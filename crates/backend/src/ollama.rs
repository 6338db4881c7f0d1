//! Ollama HTTP client.
//!
//! Talks to a local Ollama server over its native API:
//! - `POST /api/chat` (non-streaming) for generation
//! - `GET /api/tags` for model listing
//! - `GET /` for the reachability probe
//!
//! Vision capability is negotiated at runtime: a rejected image turn is
//! detected from the error body and answered text-only within the same
//! `generate_with_image` call, so the caller always receives a usable
//! payload-carrying outcome.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use emberchat_core::backend::{ChatBackend, ChatOutcome, ModelInfo, PromptContext};
use emberchat_core::error::BackendError;
use emberchat_core::message::Role;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// A client for a locally-hosted Ollama server.
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaBackend {
    /// Create a client against `base_url` with the given request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Default local server with the standard 120 s timeout.
    pub fn localhost() -> Self {
        Self::new("http://localhost:11434", Duration::from_secs(120))
    }

    /// One round-trip against `/api/chat`. Errors come back as a
    /// `ChatCallError` so the caller can classify capability rejections.
    async fn chat(&self, messages: Vec<ApiChatMessage>, model: &str) -> Result<String, ChatCallError> {
        let request = ApiChatRequest {
            model: model.to_string(),
            messages,
            stream: false,
        };
        let url = format!("{}/api/chat", self.base_url);

        debug!(model, "Sending chat request");

        let response = match self.client.post(&url).json(&request).send().await {
            Ok(response) => response,
            Err(e) => return Err(ChatCallError::Transport(describe_transport_error(&e))),
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<ApiChatResponse>().await {
                Ok(parsed) => Ok(parsed.message.content),
                Err(e) => Err(ChatCallError::Transport(format!(
                    "Failed to parse response: {e}"
                ))),
            };
        }

        let error_text = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), body = %error_text, "Backend returned error");

        if is_vision_rejection(&error_text) {
            Err(ChatCallError::VisionRejected)
        } else {
            Err(ChatCallError::Transport(format!(
                "HTTP {}: {}",
                status.as_u16(),
                error_text
            )))
        }
    }
}

/// Internal per-call error, pre-classification.
enum ChatCallError {
    /// The server rejected image input for this model.
    VisionRejected,
    /// Anything else: connection, timeout, HTTP, parse.
    Transport(String),
}

/// Whether an error body indicates the model cannot process image input.
fn is_vision_rejection(error_text: &str) -> bool {
    error_text.contains("vision")
        || error_text.contains("image")
        || error_text.contains("multimodal")
}

fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_connect() {
        "Cannot connect to Ollama server. Please run 'ollama serve' in a terminal.".to_string()
    } else if e.is_timeout() {
        "Request timed out. The model might be loading or the prompt is too complex.".to_string()
    } else {
        format!("Request failed: {e}")
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate_with_history(&self, context: &PromptContext, model: &str) -> ChatOutcome {
        // History transport is text-only: stored image references stay on
        // the entries but are not re-uploaded with every turn.
        let messages = context
            .entries
            .iter()
            .map(|entry| ApiChatMessage {
                role: role_str(entry.role),
                content: entry.content.clone(),
                images: None,
            })
            .collect();

        match self.chat(messages, model).await {
            Ok(text) => ChatOutcome::Success(text),
            // No image was sent, so a vision-flavored error body is just a
            // server error here.
            Err(ChatCallError::VisionRejected) => {
                ChatOutcome::Failure("Backend rejected the request".into())
            }
            Err(ChatCallError::Transport(detail)) => ChatOutcome::Failure(detail),
        }
    }

    async fn generate_with_image(
        &self,
        prompt: &str,
        image_base64: &str,
        model: &str,
    ) -> ChatOutcome {
        let with_image = vec![ApiChatMessage {
            role: "user",
            content: prompt.to_string(),
            images: Some(vec![image_base64.to_string()]),
        }];

        match self.chat(with_image, model).await {
            Ok(text) => ChatOutcome::Success(text),
            Err(ChatCallError::VisionRejected) => {
                // The model cannot see the image. Answer the text portion
                // anyway so the turn still yields a usable reply.
                debug!(model, "Model rejected image input, retrying text-only");
                let text_only = vec![ApiChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                    images: None,
                }];
                match self.chat(text_only, model).await {
                    Ok(text) => ChatOutcome::VisionUnsupported(text),
                    Err(ChatCallError::VisionRejected) => {
                        ChatOutcome::Failure("Backend rejected the request".into())
                    }
                    Err(ChatCallError::Transport(detail)) => ChatOutcome::Failure(detail),
                }
            }
            Err(ChatCallError::Transport(detail)) => ChatOutcome::Failure(detail),
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, BackendError> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::Network(describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(BackendError::ApiError {
                status_code: status.as_u16(),
                message: error_text,
            });
        }

        let parsed: ApiTagsResponse = response.json().await.map_err(|e| BackendError::ApiError {
            status_code: 200,
            message: format!("Failed to parse models response: {e}"),
        })?;

        Ok(parsed
            .models
            .into_iter()
            .map(|m| ModelInfo {
                name: m.name,
                size: m.size,
                digest: m.digest,
                modified_at: m.modified_at,
            })
            .collect())
    }

    async fn ping(&self) -> bool {
        match self.client.get(&self.base_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

// --- Ollama API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiChatRequest {
    model: String,
    messages: Vec<ApiChatMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiChatMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ApiChatResponse {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiTagsResponse {
    models: Vec<ApiModel>,
}

#[derive(Debug, Deserialize)]
struct ApiModel {
    name: String,
    size: i64,
    digest: String,
    modified_at: DateTime<Utc>,
}
