//! Outbound notification events.
//!
//! Events are published after an agent's critical section has been released.
//! Delivery to webhooks or dashboards is a subscriber's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use trust_core::{ActionResult, AgentId, HistoryTrigger, ReceiptId};

/// A state change worth telling the outside world about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum TrustEvent {
    TierChanged {
        agent_id: AgentId,
        old_tier: u32,
        new_tier: u32,
        score: f64,
        timestamp: DateTime<Utc>,
    },
    TrustChanged {
        agent_id: AgentId,
        old_score: f64,
        new_score: f64,
        trigger: HistoryTrigger,
        timestamp: DateTime<Utc>,
    },
    ActionRecorded {
        agent_id: AgentId,
        receipt_id: ReceiptId,
        action: String,
        result: ActionResult,
        timestamp: DateTime<Utc>,
    },
    AuthorizationDenied {
        agent_id: AgentId,
        action: String,
        current_tier: u32,
        required_tier: u32,
        current_score: f64,
        required_score: f64,
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<serde_json::Value>,
        timestamp: DateTime<Utc>,
    },
    ReceiptChainBroken {
        agent_id: AgentId,
        index: usize,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl TrustEvent {
    /// The agent this event concerns.
    #[must_use]
    pub fn agent_id(&self) -> AgentId {
        match self {
            Self::TierChanged { agent_id, .. }
            | Self::TrustChanged { agent_id, .. }
            | Self::ActionRecorded { agent_id, .. }
            | Self::AuthorizationDenied { agent_id, .. }
            | Self::ReceiptChainBroken { agent_id, .. } => *agent_id,
        }
    }

    /// Wire name of the event type.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TierChanged { .. } => "tier_changed",
            Self::TrustChanged { .. } => "trust_changed",
            Self::ActionRecorded { .. } => "action_recorded",
            Self::AuthorizationDenied { .. } => "authorization_denied",
            Self::ReceiptChainBroken { .. } => "receipt_chain_broken",
        }
    }
}

/// Fan-out channel for [`TrustEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TrustEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    ///
    /// # Panics
    /// Panics if `capacity` is zero; [`crate::EngineConfig::validate`] rejects that.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TrustEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: TrustEvent) {
        let kind = event.kind();
        if self.tx.send(event).is_err() {
            tracing::trace!(kind, "event dropped, no subscribers");
        }
    }
}
