//! Per-agent critical sections.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use trust_core::AgentId;

/// Arena of async mutexes keyed by agent id.
///
/// Holding an agent's guard serialises score recomputation and receipt chain
/// appends for that agent only; other agents proceed concurrently.
#[derive(Debug, Default)]
pub struct AgentLocks {
    locks: DashMap<AgentId, Arc<Mutex<()>>>,
}

impl AgentLocks {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `agent_id`.
    ///
    /// Entries are never evicted, so callers lock only registered agents.
    ///
    /// # Cancel Safety
    /// Cancel safe. Dropping the future before it resolves releases nothing
    /// and acquires nothing.
    pub async fn lock(&self, agent_id: AgentId) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard lock is released before awaiting.
        let mutex = Arc::clone(self.locks.entry(agent_id).or_default().value());
        mutex.lock_owned().await
    }

    /// Number of agents that have ever been locked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns `true` if no agent has been locked yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
