//! ChatBackend trait — the abstraction over the model-serving backend.
//!
//! A backend knows how to send a prompt context to a locally-hosted model
//! and get a text reply back. Capability rejections (a model that cannot
//! process image input) are modeled as an *outcome*, not an error, because
//! the backend still delivers a usable text answer in the same call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::message::Role;

/// One entry in the prompt context sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub role: Role,

    pub content: String,

    /// Durable image path references. At most one per entry in this client.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl ContextEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.images.push(image.into());
        self
    }
}

/// The ordered role/content sequence grounding a model reply in history.
///
/// Ephemeral: built fresh for every submission, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptContext {
    pub entries: Vec<ContextEntry>,
}

impl PromptContext {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The result of one generation call, as a payload-carrying tagged union.
///
/// `VisionUnsupported` is a post-hoc classification of a still-successful
/// call: the model could not process the attached image but a text-only
/// answer was produced anyway, and that answer stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// The model answered normally.
    Success(String),

    /// The model rejected the image but a text-only answer was delivered.
    VisionUnsupported(String),

    /// Transport or server failure; no usable answer.
    Failure(String),
}

impl ChatOutcome {
    /// The delivered text, if any answer was produced.
    pub fn text(&self) -> Option<&str> {
        match self {
            ChatOutcome::Success(t) | ChatOutcome::VisionUnsupported(t) => Some(t),
            ChatOutcome::Failure(_) => None,
        }
    }
}

/// A model available on the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: i64,
    pub digest: String,
    pub modified_at: DateTime<Utc>,
}

/// The core ChatBackend trait.
///
/// The orchestrator calls `generate_with_history()` or
/// `generate_with_image()` without knowing which backend is in use.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// A human-readable name for this backend (e.g., "ollama").
    fn name(&self) -> &str;

    /// Send the full conversation context and get a reply.
    async fn generate_with_history(&self, context: &PromptContext, model: &str) -> ChatOutcome;

    /// Single-turn image-aware call. `image_base64` is the staged bytes,
    /// encoded at the orchestrator boundary.
    async fn generate_with_image(
        &self,
        prompt: &str,
        image_base64: &str,
        model: &str,
    ) -> ChatOutcome;

    /// List available models.
    async fn list_models(&self) -> std::result::Result<Vec<ModelInfo>, BackendError>;

    /// Reachability probe. Never raises — any error degrades to `false`.
    async fn ping(&self) -> bool;
}
