//! # Emberchat Core
//!
//! Domain types, collaborator traits, and error definitions for the Emberchat
//! chat client. This crate has **zero framework dependencies** — it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (message store, image store, model backend)
//! is defined as a trait here. Implementations live in their respective
//! crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod backend;
pub mod error;
pub mod event;
pub mod message;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use backend::{ChatBackend, ChatOutcome, ContextEntry, ModelInfo, PromptContext};
pub use error::{BackendError, Error, Result, StoreError, ValidationError};
pub use event::{ConnectivityState, DomainEvent, EventBus};
pub use message::{Conversation, ConversationId, ImageRef, InputKind, Message, Role};
pub use store::{ConversationStore, ImageStore, NewMessage};
