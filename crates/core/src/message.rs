//! Message and Conversation domain types.
//!
//! These are the core value objects that flow through the system:
//! the user submits a turn → the orchestrator persists it → the backend
//! answers → the reply is persisted alongside the user's message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a conversation.
///
/// Opaque and store-assigned; values increase monotonically in creation
/// order, which is the only property callers may rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub i64);

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A conversation. Immutable after creation; messages belong to exactly one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub created_at: DateTime<Utc>,
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The model's reply
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// What kind of input produced a message.
///
/// Derived from the message contents, never chosen by the caller:
/// image + text → `Mixed`, image only → `Image`, otherwise `Text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputKind {
    Text,
    Image,
    Mixed,
}

impl InputKind {
    /// Derive the input kind from a turn's parts.
    pub fn derive(text: &str, has_image: bool) -> Self {
        match (text.trim().is_empty(), has_image) {
            (false, true) => InputKind::Mixed,
            (true, true) => InputKind::Image,
            _ => InputKind::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::Text => "text",
            InputKind::Image => "image",
            InputKind::Mixed => "mixed",
        }
    }

    pub fn has_image(&self) -> bool {
        matches!(self, InputKind::Image | InputKind::Mixed)
    }
}

/// A durable reference to an image persisted by the image store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Durable path returned by the image store
    pub path: String,

    /// Original filename as selected by the user
    pub filename: String,

    /// Size of the stored bytes
    pub byte_size: u64,
}

/// A single message in a conversation.
///
/// Messages are append-only: never mutated or reordered after creation.
/// Ordering is by timestamp, ties broken by insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned message ID
    pub id: i64,

    /// The conversation this message belongs to
    pub conversation_id: ConversationId,

    /// Who sent this message
    pub role: Role,

    /// The text content (possibly empty for image-only turns)
    pub content: String,

    /// What kind of input produced this message
    pub input_kind: InputKind,

    /// Image reference, present iff `input_kind` is `Image` or `Mixed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Whether the kind/image invariant holds for this message.
    pub fn invariant_holds(&self) -> bool {
        self.input_kind.has_image() == self.image.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_input_kind() {
        assert_eq!(InputKind::derive("hello", false), InputKind::Text);
        assert_eq!(InputKind::derive("hello", true), InputKind::Mixed);
        assert_eq!(InputKind::derive("", true), InputKind::Image);
        assert_eq!(InputKind::derive("   ", true), InputKind::Image);
        assert_eq!(InputKind::derive("", false), InputKind::Text);
    }

    #[test]
    fn kind_image_presence() {
        assert!(!InputKind::Text.has_image());
        assert!(InputKind::Image.has_image());
        assert!(InputKind::Mixed.has_image());
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message {
            id: 7,
            conversation_id: ConversationId(3),
            role: Role::User,
            content: "look at this".into(),
            input_kind: InputKind::Mixed,
            image: Some(ImageRef {
                path: "/data/images/abc.png".into(),
                filename: "cat.png".into(),
                byte_size: 1024,
            }),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"mixed\""));
        assert!(json.contains("cat.png"));
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.role, Role::User);
        assert!(back.invariant_holds());
    }

    #[test]
    fn text_message_skips_image_field() {
        let msg = Message {
            id: 1,
            conversation_id: ConversationId(1),
            role: Role::Assistant,
            content: "hi there".into(),
            input_kind: InputKind::Text,
            image: None,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(!json.contains("image"));
        assert!(msg.invariant_holds());
    }
}
