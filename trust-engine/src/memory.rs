//! In-memory [`TrustStore`] implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use trust_core::defaults::default_tiers;
use trust_core::{ActionReceipt, Agent, AgentId, TrustHistoryPoint, TrustTier};

use crate::{EngineError, TrustStore};

/// Thread-safe store keeping everything in process memory.
///
/// Receipts and history are kept in creation order and reversed on read.
#[derive(Debug)]
pub struct MemoryStore {
    agents: RwLock<HashMap<AgentId, Agent>>,
    receipts: RwLock<HashMap<AgentId, Vec<ActionReceipt>>>,
    history: RwLock<HashMap<AgentId, Vec<TrustHistoryPoint>>>,
    tiers: RwLock<Vec<TrustTier>>,
}

impl MemoryStore {
    /// Create an empty store seeded with the default tier table.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tiers(default_tiers())
    }

    /// Create an empty store with a custom tier table.
    #[must_use]
    pub fn with_tiers(mut tiers: Vec<TrustTier>) -> Self {
        tiers.sort_by_key(|t| t.tier);
        Self {
            agents: RwLock::new(HashMap::new()),
            receipts: RwLock::new(HashMap::new()),
            history: RwLock::new(HashMap::new()),
            tiers: RwLock::new(tiers),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TrustStore for MemoryStore {
    async fn create_agent(&self, agent: Agent) -> Result<(), EngineError> {
        let mut agents = self.agents.write().await;
        if agents.contains_key(&agent.id) {
            return Err(EngineError::Store(format!("agent {} already exists", agent.id)));
        }
        agents.insert(agent.id, agent);
        Ok(())
    }

    async fn get_agent(&self, id: AgentId) -> Result<Option<Agent>, EngineError> {
        Ok(self.agents.read().await.get(&id).cloned())
    }

    async fn update_agent(&self, agent: Agent) -> Result<(), EngineError> {
        let mut agents = self.agents.write().await;
        match agents.get_mut(&agent.id) {
            Some(slot) => {
                *slot = agent;
                Ok(())
            }
            None => Err(EngineError::agent_not_found(agent.id)),
        }
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, EngineError> {
        Ok(self.agents.read().await.values().cloned().collect())
    }

    async fn append_receipt(&self, receipt: ActionReceipt) -> Result<(), EngineError> {
        self.receipts.write().await.entry(receipt.agent_id).or_default().push(receipt);
        Ok(())
    }

    async fn get_receipts(&self, agent_id: AgentId) -> Result<Vec<ActionReceipt>, EngineError> {
        Ok(self
            .receipts
            .read()
            .await
            .get(&agent_id)
            .map(|chain| chain.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_last_receipt(
        &self,
        agent_id: AgentId,
    ) -> Result<Option<ActionReceipt>, EngineError> {
        Ok(self.receipts.read().await.get(&agent_id).and_then(|chain| chain.last().cloned()))
    }

    async fn get_tiers(&self) -> Result<Vec<TrustTier>, EngineError> {
        Ok(self.tiers.read().await.clone())
    }

    async fn put_tiers(&self, mut tiers: Vec<TrustTier>) -> Result<(), EngineError> {
        tiers.sort_by_key(|t| t.tier);
        *self.tiers.write().await = tiers;
        Ok(())
    }

    async fn append_history(
        &self,
        agent_id: AgentId,
        point: TrustHistoryPoint,
    ) -> Result<(), EngineError> {
        self.history.write().await.entry(agent_id).or_default().push(point);
        Ok(())
    }

    async fn get_history(
        &self,
        agent_id: AgentId,
        limit: usize,
    ) -> Result<Vec<TrustHistoryPoint>, EngineError> {
        Ok(self
            .history
            .read()
            .await
            .get(&agent_id)
            .map(|points| points.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
