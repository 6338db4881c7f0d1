//! Storage implementations for Emberchat.
//!
//! - [`SqliteStore`] — the production conversation/message store
//! - [`FsImageStore`] — image attachments on the local filesystem
//! - [`InMemoryStore`] / [`InMemoryImageStore`] — ephemeral stores for tests

mod fs_images;
mod in_memory;
mod sqlite;

pub use fs_images::FsImageStore;
pub use in_memory::{InMemoryImageStore, InMemoryStore};
pub use sqlite::SqliteStore;
