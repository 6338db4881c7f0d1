//! SQLite conversation/message store.
//!
//! A single database file with two tables:
//! - `conversations` — id + creation timestamp
//! - `messages` — append-only rows owned by a conversation
//!
//! Rows are never updated or deleted by this store; ordering is by
//! timestamp with row id breaking ties, which preserves insertion order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use emberchat_core::error::StoreError;
use emberchat_core::message::{
    Conversation, ConversationId, ImageRef, InputKind, Message, Role,
};
use emberchat_core::store::{ConversationStore, NewMessage};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;

/// A production SQLite store for conversations and messages.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a file path.
    ///
    /// The database and all tables are created automatically.
    /// Pass `":memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("conversations table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                conversation_id INTEGER NOT NULL REFERENCES conversations(id),
                role            TEXT NOT NULL,
                content         TEXT NOT NULL,
                input_kind      TEXT NOT NULL DEFAULT 'text',
                image_path      TEXT,
                image_filename  TEXT,
                image_size      INTEGER,
                timestamp       TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation
             ON messages(conversation_id, timestamp, id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages index: {e}")))?;

        Ok(())
    }

    /// All image paths referenced by any message row. Used by the
    /// orphaned-image sweep at startup.
    pub async fn referenced_image_paths(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT DISTINCT image_path FROM messages WHERE image_path IS NOT NULL",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| row.get::<String, _>("image_path"))
            .collect())
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, StoreError> {
        let role = match row.get::<String, _>("role").as_str() {
            "assistant" => Role::Assistant,
            _ => Role::User,
        };
        let input_kind = match row.get::<String, _>("input_kind").as_str() {
            "image" => InputKind::Image,
            "mixed" => InputKind::Mixed,
            _ => InputKind::Text,
        };

        let image = match row.get::<Option<String>, _>("image_path") {
            Some(path) => Some(ImageRef {
                path,
                filename: row
                    .get::<Option<String>, _>("image_filename")
                    .unwrap_or_default(),
                byte_size: row.get::<Option<i64>, _>("image_size").unwrap_or(0) as u64,
            }),
            None => None,
        };

        Ok(Message {
            id: row.get("id"),
            conversation_id: ConversationId(row.get("conversation_id")),
            role,
            content: row.get("content"),
            input_kind,
            image,
            timestamp: parse_timestamp(&row.get::<String, _>("timestamp"))?,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::QueryFailed(format!("bad timestamp '{raw}': {e}")))
}

#[async_trait]
impl ConversationStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, created_at FROM conversations ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        rows.iter()
            .map(|row| {
                Ok(Conversation {
                    id: ConversationId(row.get("id")),
                    created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
                })
            })
            .collect()
    }

    async fn create_conversation(&self) -> Result<ConversationId, StoreError> {
        let result = sqlx::query("INSERT INTO conversations (created_at) VALUES (?1)")
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(ConversationId(result.last_insert_rowid()))
    }

    async fn list_messages(
        &self,
        conversation: ConversationId,
    ) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, conversation_id, role, content, input_kind,
                    image_path, image_filename, image_size, timestamp
             FROM messages
             WHERE conversation_id = ?1
             ORDER BY timestamp ASC, id ASC",
        )
        .bind(conversation.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        rows.iter().map(Self::row_to_message).collect()
    }

    async fn append_message(
        &self,
        conversation: ConversationId,
        message: NewMessage,
    ) -> Result<i64, StoreError> {
        let exists = sqlx::query("SELECT id FROM conversations WHERE id = ?1")
            .bind(conversation.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(e.to_string()))?;
        if exists.is_none() {
            return Err(StoreError::ConversationNotFound(conversation.0));
        }

        let (image_path, image_filename, image_size) = match &message.image {
            Some(image) => (
                Some(image.path.clone()),
                Some(image.filename.clone()),
                Some(image.byte_size as i64),
            ),
            None => (None, None, None),
        };

        let result = sqlx::query(
            "INSERT INTO messages
                (conversation_id, role, content, input_kind,
                 image_path, image_filename, image_size, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(conversation.0)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(message.input_kind.as_str())
        .bind(image_path)
        .bind(image_filename)
        .bind(image_size)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(e.to_string()))?;

        Ok(result.last_insert_rowid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteStore {
        SqliteStore::new(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn create_and_list_conversations() {
        let store = store().await;
        let first = store.create_conversation().await.unwrap();
        let second = store.create_conversation().await.unwrap();
        assert!(second > first, "ids must be monotonically increasing");

        let conversations = store.list_conversations().await.unwrap();
        assert_eq!(conversations.len(), 2);
        // Newest first
        assert_eq!(conversations[0].id, second);
    }

    #[tokio::test]
    async fn append_preserves_order() {
        let store = store().await;
        let conv = store.create_conversation().await.unwrap();

        store
            .append_message(conv, NewMessage::user("hello", None))
            .await
            .unwrap();
        store
            .append_message(conv, NewMessage::assistant("hi there"))
            .await
            .unwrap();

        let messages = store.list_messages(conv).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "hi there");
    }

    #[tokio::test]
    async fn image_ref_roundtrip() {
        let store = store().await;
        let conv = store.create_conversation().await.unwrap();

        let image = ImageRef {
            path: "/data/images/abc_cat.png".into(),
            filename: "cat.png".into(),
            byte_size: 2048,
        };
        store
            .append_message(conv, NewMessage::user("", Some(image.clone())))
            .await
            .unwrap();

        let messages = store.list_messages(conv).await.unwrap();
        assert_eq!(messages[0].input_kind, InputKind::Image);
        assert_eq!(messages[0].image.as_ref(), Some(&image));
        assert!(messages[0].invariant_holds());
    }

    #[tokio::test]
    async fn append_to_missing_conversation_fails() {
        let store = store().await;
        let err = store
            .append_message(ConversationId(999), NewMessage::user("hello", None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConversationNotFound(999)));
    }

    #[tokio::test]
    async fn referenced_paths_are_distinct() {
        let store = store().await;
        let conv = store.create_conversation().await.unwrap();
        let image = ImageRef {
            path: "/img/one.png".into(),
            filename: "one.png".into(),
            byte_size: 1,
        };
        store
            .append_message(conv, NewMessage::user("a", Some(image.clone())))
            .await
            .unwrap();
        store
            .append_message(conv, NewMessage::user("b", Some(image)))
            .await
            .unwrap();

        let paths = store.referenced_image_paths().await.unwrap();
        assert_eq!(paths, vec!["/img/one.png".to_string()]);
    }

    #[tokio::test]
    async fn messages_are_scoped_to_their_conversation() {
        let store = store().await;
        let a = store.create_conversation().await.unwrap();
        let b = store.create_conversation().await.unwrap();

        store
            .append_message(a, NewMessage::user("in a", None))
            .await
            .unwrap();
        store
            .append_message(b, NewMessage::user("in b", None))
            .await
            .unwrap();

        let in_a = store.list_messages(a).await.unwrap();
        assert_eq!(in_a.len(), 1);
        assert_eq!(in_a[0].content, "in a");
    }
}
