//! Storage traits — the durable-state collaborators consumed by the core.
//!
//! The core never owns a persistence format. Conversations and messages
//! live behind `ConversationStore`; image bytes live behind `ImageStore`.
//! Implementations: SQLite, in-memory (for testing), filesystem.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::message::{Conversation, ConversationId, ImageRef, InputKind, Message, Role};

/// Parameters for appending one message. The store assigns id and timestamp
/// ordering; callers never mutate or reorder rows after the append.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub input_kind: InputKind,
    pub image: Option<ImageRef>,
}

impl NewMessage {
    /// A user message with its input kind derived from the parts.
    pub fn user(content: impl Into<String>, image: Option<ImageRef>) -> Self {
        let content = content.into();
        let input_kind = InputKind::derive(&content, image.is_some());
        Self {
            role: Role::User,
            content,
            input_kind,
            image,
        }
    }

    /// A plain-text assistant reply.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            input_kind: InputKind::Text,
            image: None,
        }
    }
}

/// The conversation/message store trait.
///
/// Appends are expected to preserve call order per conversation; the
/// orchestrator issues user-before-assistant and relies on nothing else.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// The store name (e.g., "sqlite", "in_memory").
    fn name(&self) -> &str;

    /// List all conversations, newest first.
    async fn list_conversations(&self) -> std::result::Result<Vec<Conversation>, StoreError>;

    /// Create a new empty conversation and return its id.
    async fn create_conversation(&self) -> std::result::Result<ConversationId, StoreError>;

    /// List a conversation's messages in timestamp order, ties by insertion.
    async fn list_messages(
        &self,
        conversation: ConversationId,
    ) -> std::result::Result<Vec<Message>, StoreError>;

    /// Append one message and return its store-assigned id.
    async fn append_message(
        &self,
        conversation: ConversationId,
        message: NewMessage,
    ) -> std::result::Result<i64, StoreError>;
}

/// Durable storage for attached image bytes.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Persist raw bytes under a unique name derived from `filename`,
    /// returning the durable path.
    async fn store_image(
        &self,
        bytes: &[u8],
        filename: &str,
    ) -> std::result::Result<String, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_derives_kind() {
        let text = NewMessage::user("hello", None);
        assert_eq!(text.input_kind, InputKind::Text);

        let image_ref = ImageRef {
            path: "/img/a.png".into(),
            filename: "a.png".into(),
            byte_size: 10,
        };
        let mixed = NewMessage::user("look", Some(image_ref.clone()));
        assert_eq!(mixed.input_kind, InputKind::Mixed);

        let image_only = NewMessage::user("", Some(image_ref));
        assert_eq!(image_only.input_kind, InputKind::Image);
    }

    #[test]
    fn assistant_message_is_text() {
        let msg = NewMessage::assistant("hi there");
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.input_kind, InputKind::Text);
        assert!(msg.image.is_none());
    }
}
