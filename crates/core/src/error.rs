//! Error types for the Emberchat domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Emberchat operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Attachment validation (rejected before any I/O) ---
    #[error("Attachment rejected: {0}")]
    Validation(#[from] ValidationError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Backend errors ---
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Attachment validation failures — resolved locally, never reach the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unsupported media type '{0}' — only image formats can be attached")]
    UnsupportedMediaType(String),

    #[error("attachment is {actual} bytes, above the {limit}-byte limit")]
    AttachmentTooLarge { actual: u64, limit: u64 },
}

/// Failures from the conversation/message/image stores.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("no such conversation: {0}")]
    ConversationNotFound(i64),

    #[error("image write failed: {0}")]
    ImageWrite(String),

    #[error("migration failed: {0}")]
    MigrationFailed(String),
}

/// Transport-level failures from the model backend.
///
/// Capability rejections are *not* errors — they are `ChatOutcome` variants
/// carrying the text that was still delivered (see `crate::backend`).
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),
}
