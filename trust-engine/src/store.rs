//! Persistence abstraction.
//!
//! The engine never owns durable storage. It is handed a [`TrustStore`] and
//! serialises per-agent read-modify-write sequences itself, so implementations
//! only need single-call atomicity.

use async_trait::async_trait;
use trust_core::{ActionReceipt, Agent, AgentId, TrustHistoryPoint, TrustTier};

use crate::EngineError;

/// Storage collaborator for agents, receipts, tiers and trust history.
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
#[async_trait]
pub trait TrustStore: Send + Sync {
    /// Insert a newly registered agent.
    ///
    /// # Errors
    /// Returns [`EngineError::Store`] if the agent already exists or the write fails.
    async fn create_agent(&self, agent: Agent) -> Result<(), EngineError>;

    /// Fetch an agent by id.
    ///
    /// # Errors
    /// Returns [`EngineError::Store`] if the read fails.
    async fn get_agent(&self, id: AgentId) -> Result<Option<Agent>, EngineError>;

    /// Replace a stored agent record.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] if the agent does not exist.
    async fn update_agent(&self, agent: Agent) -> Result<(), EngineError>;

    /// All agents, in no particular order.
    ///
    /// # Errors
    /// Returns [`EngineError::Store`] if the read fails.
    async fn list_agents(&self) -> Result<Vec<Agent>, EngineError>;

    /// Append a receipt to its agent's chain.
    ///
    /// # Errors
    /// Returns [`EngineError::Store`] if the write fails.
    async fn append_receipt(&self, receipt: ActionReceipt) -> Result<(), EngineError>;

    /// An agent's receipts, newest first.
    ///
    /// # Errors
    /// Returns [`EngineError::Store`] if the read fails.
    async fn get_receipts(&self, agent_id: AgentId) -> Result<Vec<ActionReceipt>, EngineError>;

    /// An agent's most recent receipt.
    ///
    /// # Errors
    /// Returns [`EngineError::Store`] if the read fails.
    async fn get_last_receipt(
        &self,
        agent_id: AgentId,
    ) -> Result<Option<ActionReceipt>, EngineError>;

    /// The tier table, ascending by tier number.
    ///
    /// # Errors
    /// Returns [`EngineError::Store`] if the read fails.
    async fn get_tiers(&self) -> Result<Vec<TrustTier>, EngineError>;

    /// Replace the whole tier table.
    ///
    /// # Errors
    /// Returns [`EngineError::Store`] if the write fails.
    async fn put_tiers(&self, tiers: Vec<TrustTier>) -> Result<(), EngineError>;

    /// Record a trust history point.
    ///
    /// # Errors
    /// Returns [`EngineError::Store`] if the write fails.
    async fn append_history(
        &self,
        agent_id: AgentId,
        point: TrustHistoryPoint,
    ) -> Result<(), EngineError>;

    /// Up to `limit` history points, newest first.
    ///
    /// # Errors
    /// Returns [`EngineError::Store`] if the read fails.
    async fn get_history(
        &self,
        agent_id: AgentId,
        limit: usize,
    ) -> Result<Vec<TrustHistoryPoint>, EngineError>;

    /// Look up one tier.
    ///
    /// # Errors
    /// Returns [`EngineError::Store`] if the read fails.
    async fn get_tier(&self, tier: u32) -> Result<Option<TrustTier>, EngineError> {
        Ok(self.get_tiers().await?.into_iter().find(|t| t.tier == tier))
    }
}
