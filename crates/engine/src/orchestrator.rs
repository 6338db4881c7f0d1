//! The per-turn state machine: validate, persist, dispatch, classify,
//! persist the reply, notify.
//!
//! The orchestrator owns no UI and no wire format. It consumes the store
//! and backend traits, drives one submission at a time per conversation,
//! and publishes domain events for everything the presentation layer
//! needs to react to.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, warn};

use emberchat_core::backend::ChatBackend;
use emberchat_core::error::StoreError;
use emberchat_core::event::{DomainEvent, EventBus};
use emberchat_core::message::{ConversationId, ImageRef};
use emberchat_core::store::{ConversationStore, ImageStore, NewMessage};

use crate::assembler;
use crate::attachment::AttachmentLifecycle;
use crate::fallback::{self, TurnDecision};

/// Default cap on one generation call.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// The composed-but-unsent turn: the input buffer plus the staged
/// attachment. Cleared only when a turn completes successfully, so a
/// failed submission leaves everything in place for a retry.
pub struct TurnDraft {
    text: String,
    attachment: AttachmentLifecycle,
}

impl TurnDraft {
    pub fn new() -> Self {
        Self {
            text: String::new(),
            attachment: AttachmentLifecycle::new(),
        }
    }

    /// A draft whose attachment limit comes from configuration.
    pub fn with_attachment_limit(max_bytes: u64) -> Self {
        Self {
            text: String::new(),
            attachment: AttachmentLifecycle::with_limit(max_bytes),
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attachment(&self) -> &AttachmentLifecycle {
        &self.attachment
    }

    pub fn attachment_mut(&mut self) -> &mut AttachmentLifecycle {
        &mut self.attachment
    }

    /// Whether there is anything to submit: non-blank text or a staged
    /// attachment.
    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty() || self.attachment.has_staged()
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.attachment.clear();
    }
}

impl Default for TurnDraft {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a submission did not complete.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("nothing to send")]
    NothingToSend,

    #[error("no conversation selected")]
    NoConversation,

    #[error("a turn is already in flight for conversation {0}")]
    AlreadySubmitting(ConversationId),

    #[error("could not persist attachment: {0}")]
    AttachmentPersist(#[source] StoreError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Backend(String),
}

/// What a completed turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub user_message_id: i64,
    pub assistant_message_id: i64,
    pub assistant_text: String,
    /// The model answered text-only because it could not process the
    /// attached image.
    pub vision_advisory: bool,
}

/// Drives submissions for all conversations. Cheap to share: clone the
/// `Arc`s in, wrap the whole thing in an `Arc` out.
pub struct TurnOrchestrator {
    store: Arc<dyn ConversationStore>,
    images: Arc<dyn ImageStore>,
    backend: Arc<dyn ChatBackend>,
    events: Arc<EventBus>,
    generation_timeout: Duration,
    in_flight: Arc<Mutex<HashSet<ConversationId>>>,
}

impl TurnOrchestrator {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        images: Arc<dyn ImageStore>,
        backend: Arc<dyn ChatBackend>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            images,
            backend,
            events,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Override the generation timeout (from configuration).
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    /// Whether a turn is currently in flight for this conversation.
    pub fn is_submitting(&self, conversation: ConversationId) -> bool {
        lock_in_flight(&self.in_flight).contains(&conversation)
    }

    /// Run one full turn: persist the attachment and user message, call
    /// the backend, classify the outcome, persist the reply.
    ///
    /// The user message is committed before the backend call, so it
    /// survives any downstream failure. On failure the draft is left
    /// untouched; on success it is cleared.
    pub async fn submit(
        &self,
        conversation: Option<ConversationId>,
        draft: &mut TurnDraft,
        model: &str,
    ) -> Result<TurnOutcome, TurnError> {
        let conversation = conversation.ok_or(TurnError::NoConversation)?;
        if !draft.has_content() {
            return Err(TurnError::NothingToSend);
        }
        let _guard = self.acquire(conversation)?;
        debug!(%conversation, model, "submitting turn");

        // Persist the staged attachment first. If the write fails the
        // attachment stays staged and nothing else has happened yet.
        let image_ref = match draft.attachment.staged() {
            Some(staged) => {
                match self
                    .images
                    .store_image(staged.bytes(), staged.filename())
                    .await
                {
                    Ok(path) => Some(ImageRef {
                        path,
                        filename: staged.filename().to_string(),
                        byte_size: staged.byte_size(),
                    }),
                    Err(err) => {
                        warn!(%conversation, error = %err, "attachment persist failed");
                        self.fail(conversation, format!("could not save attachment: {err}"));
                        return Err(TurnError::AttachmentPersist(err));
                    }
                }
            }
            None => None,
        };
        let image_base64 = draft
            .attachment
            .staged()
            .map(|staged| BASE64.encode(staged.bytes()));

        let text = draft.text.trim().to_string();

        // Snapshot history before the user append so assembly adds the
        // pending turn exactly once.
        let history = match self.store.list_messages(conversation).await {
            Ok(history) => history,
            Err(err) => {
                self.fail(conversation, format!("could not load history: {err}"));
                return Err(TurnError::Store(err));
            }
        };

        let user_message = NewMessage::user(text.clone(), image_ref.clone());
        let user_message_id = match self.store.append_message(conversation, user_message).await {
            Ok(id) => id,
            Err(err) => {
                self.fail(conversation, format!("could not save message: {err}"));
                return Err(TurnError::Store(err));
            }
        };

        let had_image = image_base64.is_some();
        let generation = async {
            if let Some(encoded) = &image_base64 {
                let prompt = assembler::effective_prompt(&text, true);
                self.backend
                    .generate_with_image(prompt, encoded, model)
                    .await
            } else {
                let context = assembler::assemble(&history, &text, image_ref.as_ref());
                self.backend.generate_with_history(&context, model).await
            }
        };
        let outcome = match tokio::time::timeout(self.generation_timeout, generation).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let detail = format!(
                    "generation timed out after {}s",
                    self.generation_timeout.as_secs()
                );
                self.fail(conversation, detail.clone());
                return Err(TurnError::Backend(detail));
            }
        };

        match fallback::decide(outcome, had_image) {
            TurnDecision::PersistReply { text: reply, advisory } => {
                let assistant_message_id = match self
                    .store
                    .append_message(conversation, NewMessage::assistant(reply.clone()))
                    .await
                {
                    Ok(id) => id,
                    Err(err) => {
                        self.fail(conversation, format!("could not save reply: {err}"));
                        return Err(TurnError::Store(err));
                    }
                };

                if advisory {
                    info!(%conversation, model, "model answered text-only, image not processed");
                    self.events.publish(DomainEvent::VisionAdvisory {
                        conversation_id: conversation,
                        model: model.to_string(),
                        timestamp: Utc::now(),
                    });
                }

                draft.clear();
                self.events.publish(DomainEvent::MessageListChanged {
                    conversation_id: conversation,
                    timestamp: Utc::now(),
                });

                Ok(TurnOutcome {
                    user_message_id,
                    assistant_message_id,
                    assistant_text: reply,
                    vision_advisory: advisory,
                })
            }
            TurnDecision::Abort { detail } => {
                warn!(%conversation, detail, "turn aborted");
                self.fail(conversation, detail.clone());
                Err(TurnError::Backend(detail))
            }
        }
    }

    fn acquire(&self, conversation: ConversationId) -> Result<InFlightGuard, TurnError> {
        let mut set = lock_in_flight(&self.in_flight);
        if !set.insert(conversation) {
            return Err(TurnError::AlreadySubmitting(conversation));
        }
        drop(set);
        Ok(InFlightGuard {
            set: Arc::clone(&self.in_flight),
            conversation,
        })
    }

    fn fail(&self, conversation: ConversationId, detail: String) {
        self.events.publish(DomainEvent::TurnFailed {
            conversation_id: conversation,
            detail,
            timestamp: Utc::now(),
        });
    }
}

/// Removes the conversation from the in-flight set however the turn ends.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<ConversationId>>>,
    conversation: ConversationId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock_in_flight(&self.set).remove(&self.conversation);
    }
}

fn lock_in_flight(
    set: &Mutex<HashSet<ConversationId>>,
) -> MutexGuard<'_, HashSet<ConversationId>> {
    // The set holds plain ids; a poisoned lock is still usable.
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
