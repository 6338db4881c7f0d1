//! In-memory stores — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use emberchat_core::error::StoreError;
use emberchat_core::message::{Conversation, ConversationId, Message};
use emberchat_core::store::{ConversationStore, ImageStore, NewMessage};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    next_conversation_id: i64,
    next_message_id: i64,
}

/// A conversation store backed by plain Vecs. Preserves the same ordering
/// guarantees as the SQLite store: monotonic ids, append order per
/// conversation, newest conversation first.
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        let state = self.state.read().await;
        let mut conversations = state.conversations.clone();
        conversations.reverse(); // newest first
        Ok(conversations)
    }

    async fn create_conversation(&self) -> Result<ConversationId, StoreError> {
        let mut state = self.state.write().await;
        state.next_conversation_id += 1;
        let id = ConversationId(state.next_conversation_id);
        state.conversations.push(Conversation {
            id,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn list_messages(
        &self,
        conversation: ConversationId,
    ) -> Result<Vec<Message>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation)
            .cloned()
            .collect())
    }

    async fn append_message(
        &self,
        conversation: ConversationId,
        message: NewMessage,
    ) -> Result<i64, StoreError> {
        let mut state = self.state.write().await;
        if !state.conversations.iter().any(|c| c.id == conversation) {
            return Err(StoreError::ConversationNotFound(conversation.0));
        }
        state.next_message_id += 1;
        let id = state.next_message_id;
        state.messages.push(Message {
            id,
            conversation_id: conversation,
            role: message.role,
            content: message.content,
            input_kind: message.input_kind,
            image: message.image,
            timestamp: Utc::now(),
        });
        Ok(id)
    }
}

/// An in-memory image store with optional write-failure injection, for
/// exercising the turn-abort path without touching the filesystem.
pub struct InMemoryImageStore {
    images: RwLock<Vec<(String, Vec<u8>)>>,
    fail_writes: AtomicBool,
}

impl InMemoryImageStore {
    pub fn new() -> Self {
        Self {
            images: RwLock::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make subsequent `store_image` calls fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn stored_count(&self) -> usize {
        self.images.read().await.len()
    }
}

impl Default for InMemoryImageStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageStore for InMemoryImageStore {
    async fn store_image(&self, bytes: &[u8], filename: &str) -> Result<String, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::ImageWrite("injected write failure".into()));
        }
        let path = format!("mem://{}/{}", Uuid::new_v4(), filename);
        self.images
            .write()
            .await
            .push((path.clone(), bytes.to_vec()));
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emberchat_core::message::Role;

    #[tokio::test]
    async fn ids_are_monotonic() {
        let store = InMemoryStore::new();
        let a = store.create_conversation().await.unwrap();
        let b = store.create_conversation().await.unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn append_order_is_preserved() {
        let store = InMemoryStore::new();
        let conv = store.create_conversation().await.unwrap();
        store
            .append_message(conv, NewMessage::user("one", None))
            .await
            .unwrap();
        store
            .append_message(conv, NewMessage::assistant("two"))
            .await
            .unwrap();

        let messages = store.list_messages(conv).await.unwrap();
        assert_eq!(messages[0].content, "one");
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].content, "two");
    }

    #[tokio::test]
    async fn image_store_failure_injection() {
        let images = InMemoryImageStore::new();
        images.store_image(b"ok", "a.png").await.unwrap();

        images.set_fail_writes(true);
        assert!(images.store_image(b"no", "b.png").await.is_err());
        assert_eq!(images.stored_count().await, 1);
    }
}
