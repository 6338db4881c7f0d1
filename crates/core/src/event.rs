//! Domain event system — decoupled communication toward the presentation layer.
//!
//! Events are published when something UI-visible happens in the core.
//! The frontend subscribes to reload message lists, show advisories, and
//! surface failures without being coupled to the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::message::ConversationId;

/// Reachability of the model backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    /// No probe has completed yet
    #[default]
    Unknown,
    Reachable,
    Unreachable,
}

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A turn completed and the message list for a conversation changed
    MessageListChanged {
        conversation_id: ConversationId,
        timestamp: DateTime<Utc>,
    },

    /// The active model answered but could not process the attached image
    VisionAdvisory {
        conversation_id: ConversationId,
        model: String,
        timestamp: DateTime<Utc>,
    },

    /// A turn failed; the draft was preserved
    TurnFailed {
        conversation_id: ConversationId,
        detail: String,
        timestamp: DateTime<Utc>,
    },

    /// The connectivity monitor observed a state transition
    ConnectivityChanged {
        state: ConnectivityState,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
/// Components subscribe to receive all events and filter for what they care about.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::MessageListChanged {
            conversation_id: ConversationId(3),
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::MessageListChanged {
                conversation_id, ..
            } => {
                assert_eq!(*conversation_id, ConversationId(3));
            }
            _ => panic!("Expected MessageListChanged event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        // Publishing with no subscribers should not panic
        bus.publish(DomainEvent::TurnFailed {
            conversation_id: ConversationId(1),
            detail: "no subscribers".into(),
            timestamp: Utc::now(),
        });
    }

    #[test]
    fn connectivity_starts_unknown() {
        assert_eq!(ConnectivityState::default(), ConnectivityState::Unknown);
    }
}
