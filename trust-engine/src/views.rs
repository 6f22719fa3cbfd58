//! Request and response shapes exposed by [`crate::TrustEngine`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use trust_core::scoring::{BehaviorFactors, ConfigFactors, IdentityFactors};
use trust_core::{ActionResult, AgentId, ScoreWeights};

/// A request to record one action outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub agent_id: AgentId,
    pub action: String,
    pub result: ActionResult,
    /// Defaults to the current time.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Result of gating one action for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    pub allowed: bool,
    pub agent_id: AgentId,
    pub action: String,
    pub current_tier: u32,
    pub required_tier: u32,
    pub current_score: f64,
    pub required_score: f64,
    pub reason: String,
}

/// Per-action results of a batch check, in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchAuthorizationResponse {
    pub agent_id: AgentId,
    pub results: IndexMap<String, AuthorizationResponse>,
}

/// Factor detail for each sub-score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreFactors {
    pub identity: IdentityFactors,
    pub config: ConfigFactors,
    pub behavior: BehaviorFactors,
}

/// Freshly computed sub-scores alongside the stored composite and tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustBreakdown {
    pub agent_id: AgentId,
    pub identity_score: f64,
    pub config_score: f64,
    pub behavior_score: f64,
    pub composite_score: f64,
    pub tier: u32,
    pub tier_name: String,
    pub weights: ScoreWeights,
    pub factors: ScoreFactors,
}

/// Capability card describing an agent to peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCard {
    pub agent_id: AgentId,
    pub name: String,
    pub provider: String,
    pub spiffe_id: Option<String>,
    pub capabilities: Vec<String>,
    pub trust_score: f64,
    pub trust_tier: u32,
    pub tier_name: String,
    pub created_at: DateTime<Utc>,
    pub last_action_at: Option<DateTime<Utc>>,
    pub total_actions: usize,
    pub success_rate: f64,
    pub permitted_actions: Vec<String>,
}

/// Fleet-wide counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total_agents: usize,
    pub total_actions: usize,
    pub agents_by_tier: BTreeMap<u32, usize>,
    /// Receipts stamped within the last 24 hours.
    pub recent_actions: usize,
    /// Agent counts per composite bucket, lower bound inclusive.
    pub trust_score_distribution: BTreeMap<String, usize>,
}

/// Composite score buckets used by [`DashboardStats`].
pub const SCORE_BUCKETS: [(&str, f64); 4] =
    [("0.0-0.2", 0.0), ("0.2-0.5", 0.2), ("0.5-0.8", 0.5), ("0.8-1.0", 0.8)];

/// Bucket label for a composite score.
#[must_use]
pub fn score_bucket(score: f64) -> &'static str {
    SCORE_BUCKETS
        .iter()
        .rev()
        .find(|(_, lower)| score >= *lower)
        .map_or(SCORE_BUCKETS[0].0, |b| b.0)
}
