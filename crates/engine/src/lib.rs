//! # Emberchat Engine
//!
//! The chat turn orchestration engine: everything between the compose box
//! and the persisted assistant reply.
//!
//! - [`AttachmentLifecycle`] — the staged image for the in-progress turn
//! - [`assembler`] — pure history-to-prompt-context assembly
//! - [`fallback`] — capability fallback policy over backend outcomes
//! - [`TurnOrchestrator`] — the per-turn state machine
//! - [`ConnectivityMonitor`] — periodic backend reachability probe

pub mod assembler;
pub mod attachment;
pub mod connectivity;
pub mod fallback;
pub mod orchestrator;

pub use attachment::{AttachmentLifecycle, PendingAttachment, PreviewHandle};
pub use connectivity::ConnectivityMonitor;
pub use fallback::TurnDecision;
pub use orchestrator::{TurnDraft, TurnError, TurnOrchestrator, TurnOutcome};
