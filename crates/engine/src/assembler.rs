//! History-to-prompt-context assembly.
//!
//! Converts the durable message log plus the pending turn into the ordered
//! context the backend expects.
//!
//! # Determinism
//!
//! Assembly is a pure function: no I/O, no mutation of inputs, identical
//! inputs always produce identical output. This keeps it independently
//! testable without mocking the backend.

use emberchat_core::backend::{ContextEntry, PromptContext};
use emberchat_core::message::{ImageRef, Message, Role};

/// The canonical prompt substituted when a turn carries only an image,
/// so the backend always receives non-empty content.
pub const IMAGE_ONLY_PROMPT: &str = "What do you see in this image?";

/// The content actually sent for the pending turn. Callers guarantee at
/// least one of text/image is present (the orchestrator's submit guard).
pub fn effective_prompt(pending_text: &str, has_image: bool) -> &str {
    let trimmed = pending_text.trim();
    if trimmed.is_empty() && has_image {
        IMAGE_ONLY_PROMPT
    } else {
        trimmed
    }
}

/// Build the prompt context: one entry per existing message, in order,
/// role and content verbatim, then the pending turn appended last as a
/// `user` entry.
pub fn assemble(
    existing: &[Message],
    pending_text: &str,
    pending_image: Option<&ImageRef>,
) -> PromptContext {
    let mut entries: Vec<ContextEntry> = existing
        .iter()
        .map(|message| {
            let mut entry = ContextEntry::new(message.role, message.content.clone());
            if let Some(image) = &message.image {
                entry = entry.with_image(image.path.clone());
            }
            entry
        })
        .collect();

    let mut pending = ContextEntry::new(
        Role::User,
        effective_prompt(pending_text, pending_image.is_some()),
    );
    if let Some(image) = pending_image {
        pending = pending.with_image(image.path.clone());
    }
    entries.push(pending);

    PromptContext { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use emberchat_core::message::{ConversationId, InputKind};

    fn message(id: i64, role: Role, content: &str, image: Option<ImageRef>) -> Message {
        let input_kind = InputKind::derive(content, image.is_some());
        Message {
            id,
            conversation_id: ConversationId(1),
            role,
            content: content.into(),
            input_kind,
            image,
            timestamp: Utc::now(),
        }
    }

    fn image_ref(path: &str) -> ImageRef {
        ImageRef {
            path: path.into(),
            filename: "img.png".into(),
            byte_size: 64,
        }
    }

    #[test]
    fn preserves_order_and_fidelity() {
        let history = vec![
            message(1, Role::User, "hello", None),
            message(2, Role::Assistant, "hi there", None),
            message(3, Role::User, "and this?", Some(image_ref("/img/a.png"))),
        ];

        let context = assemble(&history, "tell me more", None);

        // Exactly the input list plus one appended pending entry
        assert_eq!(context.len(), 4);
        for (entry, original) in context.entries.iter().zip(&history) {
            assert_eq!(entry.role, original.role);
            assert_eq!(entry.content, original.content);
        }
        assert_eq!(context.entries[2].images, vec!["/img/a.png".to_string()]);
        assert!(context.entries[0].images.is_empty());

        let pending = context.entries.last().unwrap();
        assert_eq!(pending.role, Role::User);
        assert_eq!(pending.content, "tell me more");
        assert!(pending.images.is_empty());
    }

    #[test]
    fn empty_history_yields_single_pending_entry() {
        let context = assemble(&[], "hello", None);
        assert_eq!(context.len(), 1);
        assert_eq!(context.entries[0].content, "hello");
    }

    #[test]
    fn image_only_turn_gets_canonical_prompt() {
        let image = image_ref("/img/b.png");
        let context = assemble(&[], "", Some(&image));

        let pending = context.entries.last().unwrap();
        assert_eq!(pending.content, "What do you see in this image?");
        assert_eq!(pending.images, vec!["/img/b.png".to_string()]);
    }

    #[test]
    fn whitespace_only_text_counts_as_absent() {
        let image = image_ref("/img/c.png");
        assert_eq!(effective_prompt("   \n", true), IMAGE_ONLY_PROMPT);
        let context = assemble(&[], "   ", Some(&image));
        assert_eq!(context.entries[0].content, IMAGE_ONLY_PROMPT);
    }

    #[test]
    fn text_with_image_keeps_user_text() {
        let image = image_ref("/img/d.png");
        let context = assemble(&[], "what breed is this cat?", Some(&image));
        let pending = &context.entries[0];
        assert_eq!(pending.content, "what breed is this cat?");
        assert_eq!(pending.images.len(), 1);
    }

    #[test]
    fn inputs_are_not_mutated_and_assembly_is_deterministic() {
        let history = vec![message(1, Role::User, "hello", None)];
        let first = assemble(&history, "again", None);
        let second = assemble(&history, "again", None);
        assert_eq!(first, second);
        assert_eq!(history[0].content, "hello");
    }
}
