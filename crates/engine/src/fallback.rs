//! Capability fallback policy.
//!
//! Given a backend outcome, decide the next UI-visible action. This is a
//! pure classification function with no side effects: the orchestrator
//! performs whatever the decision says.
//!
//! `VisionUnsupported` looks asymmetric on purpose: the backend call that
//! failed vision processing still delivered a text-only answer in the same
//! call, so the "failure" is a post-hoc classification of a successful
//! response. The delivered text stands; the user just gets an advisory.
//! No automatic image-less retry is issued from here.

use emberchat_core::backend::ChatOutcome;

/// What the orchestrator should do with a backend outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnDecision {
    /// Persist the delivered text as the assistant's reply.
    /// `advisory` is set when the user should be told their image was
    /// not processed.
    PersistReply { text: String, advisory: bool },

    /// Abort the turn; surface `detail` verbatim; persist nothing.
    Abort { detail: String },
}

/// Classify a backend outcome for a turn that did or did not carry an image.
pub fn decide(outcome: ChatOutcome, had_image: bool) -> TurnDecision {
    match outcome {
        ChatOutcome::Success(text) => TurnDecision::PersistReply {
            text,
            advisory: false,
        },
        ChatOutcome::VisionUnsupported(text) => TurnDecision::PersistReply {
            // A vision classification without an image sent is spurious;
            // treat it as a plain success.
            advisory: had_image,
            text,
        },
        ChatOutcome::Failure(detail) => TurnDecision::Abort { detail },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_persists_without_advisory() {
        let decision = decide(ChatOutcome::Success("hi there".into()), false);
        assert_eq!(
            decision,
            TurnDecision::PersistReply {
                text: "hi there".into(),
                advisory: false
            }
        );
    }

    #[test]
    fn vision_unsupported_with_image_persists_and_advises() {
        let decision = decide(
            ChatOutcome::VisionUnsupported("text answer".into()),
            true,
        );
        match decision {
            TurnDecision::PersistReply { text, advisory } => {
                assert_eq!(text, "text answer");
                assert!(advisory, "the user must be informed");
            }
            TurnDecision::Abort { .. } => panic!("delivered text must be kept"),
        }
    }

    #[test]
    fn vision_unsupported_without_image_is_plain_success() {
        let decision = decide(ChatOutcome::VisionUnsupported("answer".into()), false);
        assert_eq!(
            decision,
            TurnDecision::PersistReply {
                text: "answer".into(),
                advisory: false
            }
        );
    }

    #[test]
    fn failure_aborts_with_verbatim_detail() {
        let decision = decide(
            ChatOutcome::Failure("HTTP 500: model exploded".into()),
            true,
        );
        assert_eq!(
            decision,
            TurnDecision::Abort {
                detail: "HTTP 500: model exploded".into()
            }
        );
    }
}
