//! High-level trust engine wrapping a [`TrustStore`].
//!
//! Every mutation of one agent (scores, tier, config counter, receipt chain
//! tail) runs inside that agent's critical section. Tier table rewrites are
//! serialised by a single engine-wide guard. Events are published only after
//! the section is released and the store has been written.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use tokio::sync::{broadcast, Mutex};
use trust_core::scoring::{behavior_score, config_score, identity_score, score_agent};
use trust_core::tier::{find_tier, validate_tier_table};
use trust_core::{
    check_authorization, determine_tier, permitted_actions, receipt_time, ActionReceipt,
    ActionResult, Agent, AgentId, CoreError, HistoryTrigger, ReceiptId, Registration,
    TrustHistoryPoint, TrustScore, TrustTier,
};

use crate::chain::{self, ChainReport};
use crate::signing::{receipt_hash, ReceiptSigner, DELIMITER};
use crate::token::{CapabilityClaims, IssuedToken, TokenIssuer};
use crate::views::{
    score_bucket, ActionRecord, AgentCard, AuthorizationResponse, BatchAuthorizationResponse,
    DashboardStats, ScoreFactors, TrustBreakdown, SCORE_BUCKETS,
};
use crate::{AgentLocks, EngineConfig, EngineError, EventBus, TrustEvent, TrustStore};

/// History points returned when the caller gives no limit.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Tier name reported when an agent's tier is missing from the table.
const UNKNOWN_TIER: &str = "Unknown";

/// How far past the engine clock a caller-supplied receipt timestamp may lie.
pub const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Orchestrates scoring, receipts, authorization and tokens over a store.
///
/// All operations are safe to call concurrently. Contention is agent-local.
pub struct TrustEngine<S: TrustStore> {
    store: S,
    config: EngineConfig,
    floor: TrustScore,
    signer: ReceiptSigner,
    tokens: TokenIssuer,
    locks: AgentLocks,
    tier_table: Mutex<()>,
    events: EventBus,
}

impl<S: TrustStore> TrustEngine<S> {
    /// Create an engine over `store`.
    ///
    /// # Errors
    /// Returns [`EngineError::Config`] if `config` fails validation.
    pub fn new(config: EngineConfig, store: S) -> Result<Self, EngineError> {
        let floor = config.validate()?;
        let signer = ReceiptSigner::new(config.signing_secret.clone())?;
        let tokens = TokenIssuer::new(config.token_secret(), config.token_issuer.clone());
        let events = EventBus::new(config.event_capacity);
        Ok(Self {
            store,
            config,
            floor,
            signer,
            tokens,
            locks: AgentLocks::new(),
            tier_table: Mutex::new(()),
            events,
        })
    }

    /// The backing store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The configuration this engine was built with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The receipt signer, for offline verification.
    #[must_use]
    pub fn signer(&self) -> &ReceiptSigner {
        &self.signer
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TrustEvent> {
        self.events.subscribe()
    }

    /// Registers a new agent with initial scores and the Sybil floor applied.
    ///
    /// # Errors
    /// Returns [`EngineError::Validation`] for malformed identity facts, or
    /// propagates store failures.
    pub async fn register(&self, registration: Registration) -> Result<Agent, EngineError> {
        let registration = registration.validate()?;
        let now = Utc::now();
        let mut agent = Agent::new(AgentId::new(), registration, now);

        let tiers = self.store.get_tiers().await?;
        self.apply_scores(&mut agent, &[], &tiers);

        self.store.create_agent(agent.clone()).await?;
        self.store
            .append_history(agent.id, history_point(&agent, HistoryTrigger::Registration, now))
            .await?;

        tracing::info!(
            agent_id = %agent.id,
            name = %agent.name,
            provider = %agent.provider,
            score = agent.composite_score.value(),
            tier = agent.tier,
            "agent registered"
        );
        Ok(agent)
    }

    /// Fetch an agent.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] if the agent does not exist.
    pub async fn agent(&self, agent_id: AgentId) -> Result<Agent, EngineError> {
        self.store.get_agent(agent_id).await?.ok_or_else(|| EngineError::agent_not_found(agent_id))
    }

    /// Records a reported configuration fingerprint.
    ///
    /// A changed fingerprint bumps the change counter and rescores the agent.
    /// An unchanged one returns the agent untouched.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] for an unknown agent and
    /// [`EngineError::Validation`] for an empty fingerprint.
    pub async fn report_config(
        &self,
        agent_id: AgentId,
        fingerprint: &str,
    ) -> Result<Agent, EngineError> {
        let fingerprint = fingerprint.trim();
        if fingerprint.is_empty() {
            return Err(EngineError::Validation("config_hash must not be empty".to_owned()));
        }

        // Lock entries are only ever created for registered agents.
        self.agent(agent_id).await?;
        let (agent, events) = {
            let _guard = self.locks.lock(agent_id).await;
            let mut agent = self.agent(agent_id).await?;
            if !agent.observe_config(fingerprint) {
                return Ok(agent);
            }
            tracing::info!(
                agent_id = %agent_id,
                config_changes = agent.config_changes,
                "configuration change observed"
            );
            let events = self.rescore(&mut agent, HistoryTrigger::ConfigChange).await?;
            (agent, events)
        };

        self.publish_all(events);
        Ok(agent)
    }

    /// Appends a signed receipt to the agent's chain and rescores the agent.
    ///
    /// Not idempotent: each call adds a link. The receipt is committed before
    /// the agent is rescored; if rescoring fails the receipt stands and the
    /// stored scores catch up on the agent's next mutation, so a
    /// [`EngineError::Store`] failure must not be retried blindly.
    ///
    /// # Errors
    /// - [`EngineError::Validation`] for an empty action, an action containing
    ///   the signature delimiter, a timestamp more than
    ///   [`MAX_CLOCK_SKEW_SECS`] ahead of the engine clock, or a timestamp
    ///   older than the last receipt
    /// - [`EngineError::NotFound`] for an unknown agent
    pub async fn record_action(&self, record: ActionRecord) -> Result<ActionReceipt, EngineError> {
        let ActionRecord { agent_id, action, result, timestamp } = record;
        let action = action.trim().to_owned();
        if action.is_empty() {
            return Err(EngineError::Validation("action must not be empty".to_owned()));
        }
        if action.contains(DELIMITER) {
            return Err(EngineError::Validation(format!("action must not contain '{DELIMITER}'")));
        }
        if let Some(timestamp) = timestamp {
            let latest = Utc::now() + Duration::seconds(MAX_CLOCK_SKEW_SECS);
            if timestamp > latest {
                return Err(EngineError::Validation(format!(
                    "timestamp {timestamp} is more than {MAX_CLOCK_SKEW_SECS}s in the future"
                )));
            }
        }

        self.agent(agent_id).await?;
        let (receipt, events) = {
            let _guard = self.locks.lock(agent_id).await;
            let mut agent = self.agent(agent_id).await?;

            let last = self.store.get_last_receipt(agent_id).await?;
            let timestamp = receipt_time(timestamp.unwrap_or_else(Utc::now));
            if let Some(last) = &last {
                if timestamp < last.timestamp {
                    return Err(EngineError::Validation(format!(
                        "timestamp {timestamp} precedes last receipt at {}",
                        last.timestamp
                    )));
                }
            }

            let previous_hash = last.map(|r| r.receipt_hash);
            let receipt = self.seal(agent_id, action, result, timestamp, previous_hash);
            self.store.append_receipt(receipt.clone()).await?;
            tracing::info!(
                agent_id = %agent_id,
                receipt_id = %receipt.id,
                action = %receipt.action,
                result = %receipt.result,
                "receipt appended"
            );

            let mut events = vec![TrustEvent::ActionRecorded {
                agent_id,
                receipt_id: receipt.id,
                action: receipt.action.clone(),
                result: receipt.result,
                timestamp: receipt.timestamp,
            }];
            events.extend(self.rescore(&mut agent, HistoryTrigger::Action).await?);
            (receipt, events)
        };

        self.publish_all(events);
        Ok(receipt)
    }

    /// Gates one action against the agent's current tier and score.
    ///
    /// Denials are logged and published with the optional caller `context`.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] for an unknown agent.
    pub async fn authorize(
        &self,
        agent_id: AgentId,
        action: &str,
        context: Option<serde_json::Value>,
    ) -> Result<AuthorizationResponse, EngineError> {
        let agent = self.agent(agent_id).await?;
        let response = self.gate(&agent, action);
        if !response.allowed {
            self.deny(&response, context);
        }
        Ok(response)
    }

    /// Gates each action independently, keyed by action in request order.
    ///
    /// Duplicate actions collapse to one entry.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] for an unknown agent.
    pub async fn authorize_batch(
        &self,
        agent_id: AgentId,
        actions: &[String],
    ) -> Result<BatchAuthorizationResponse, EngineError> {
        let agent = self.agent(agent_id).await?;
        let mut results = IndexMap::with_capacity(actions.len());
        for action in actions {
            if results.contains_key(action) {
                continue;
            }
            let response = self.gate(&agent, action);
            if !response.allowed {
                self.deny(&response, None);
            }
            results.insert(action.clone(), response);
        }
        Ok(BatchAuthorizationResponse { agent_id, results })
    }

    /// Issues a capability token snapshotting the agent's tier and actions.
    ///
    /// `expires_in` defaults to the configured lifetime.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] for an unknown agent and
    /// [`EngineError::Validation`] for a zero lifetime.
    pub async fn issue_token(
        &self,
        agent_id: AgentId,
        expires_in: Option<u64>,
    ) -> Result<IssuedToken, EngineError> {
        let agent = self.agent(agent_id).await?;
        let tiers = self.store.get_tiers().await?;
        let expires_in = expires_in.unwrap_or(self.config.default_token_ttl_secs);
        self.tokens.issue(&agent, &tiers, expires_in, Utc::now())
    }

    /// Verifies a capability token and returns its claims.
    ///
    /// # Errors
    /// Returns [`EngineError::TokenExpired`] or [`EngineError::SignatureInvalid`].
    pub fn verify_token(&self, token: &str) -> Result<CapabilityClaims, EngineError> {
        self.tokens.verify(token)
    }

    /// Freshly computed sub-scores and factors next to the stored composite.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] for an unknown agent.
    pub async fn trust_breakdown(&self, agent_id: AgentId) -> Result<TrustBreakdown, EngineError> {
        let agent = self.agent(agent_id).await?;
        let outcomes = outcomes(&self.store.get_receipts(agent_id).await?);
        let tier = self.store.get_tier(agent.tier).await?;

        let (identity, identity_factors) = identity_score(&agent);
        let (config, config_factors) = config_score(agent.config_changes);
        let (behavior, behavior_factors) = behavior_score(&outcomes);

        Ok(TrustBreakdown {
            agent_id,
            identity_score: identity.rounded(),
            config_score: config.rounded(),
            behavior_score: behavior.rounded(),
            composite_score: agent.composite_score.rounded(),
            tier: agent.tier,
            tier_name: tier_name(tier.as_ref()),
            weights: self.config.weights,
            factors: ScoreFactors {
                identity: identity_factors,
                config: config_factors,
                behavior: behavior_factors,
            },
        })
    }

    /// Trust history, newest first.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] for an unknown agent.
    pub async fn trust_history(
        &self,
        agent_id: AgentId,
        limit: Option<usize>,
    ) -> Result<Vec<TrustHistoryPoint>, EngineError> {
        self.agent(agent_id).await?;
        self.store.get_history(agent_id, limit.unwrap_or(DEFAULT_HISTORY_LIMIT)).await
    }

    /// The agent's receipts, newest first.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] for an unknown agent.
    pub async fn receipts(&self, agent_id: AgentId) -> Result<Vec<ActionReceipt>, EngineError> {
        self.agent(agent_id).await?;
        self.store.get_receipts(agent_id).await
    }

    /// Walks the agent's whole receipt chain.
    ///
    /// # Errors
    /// - [`EngineError::NotFound`] for an unknown agent
    /// - [`EngineError::ChainBroken`] or [`EngineError::SignatureInvalid`] for
    ///   the first bad link, which is also logged and published
    pub async fn verify_chain(&self, agent_id: AgentId) -> Result<ChainReport, EngineError> {
        self.agent(agent_id).await?;
        let mut receipts = self.store.get_receipts(agent_id).await?;
        receipts.reverse();

        match chain::verify_chain(&self.signer, agent_id, &receipts) {
            Ok(report) => {
                tracing::debug!(
                    agent_id = %agent_id,
                    length = report.length,
                    "receipt chain verified"
                );
                Ok(report)
            }
            Err(fault) => {
                tracing::error!(
                    agent_id = %agent_id,
                    index = fault.index,
                    reason = %fault.reason,
                    "receipt chain integrity failure"
                );
                self.events.publish(TrustEvent::ReceiptChainBroken {
                    agent_id,
                    index: fault.index,
                    reason: fault.reason.clone(),
                    timestamp: Utc::now(),
                });
                Err(fault.into())
            }
        }
    }

    /// A capability card describing the agent to peers.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] for an unknown agent.
    pub async fn agent_card(&self, agent_id: AgentId) -> Result<AgentCard, EngineError> {
        let agent = self.agent(agent_id).await?;
        let receipts = self.store.get_receipts(agent_id).await?;
        let tiers = self.store.get_tiers().await?;
        let (_, behavior) = behavior_score(&outcomes(&receipts));

        Ok(AgentCard {
            agent_id,
            trust_score: agent.composite_score.rounded(),
            trust_tier: agent.tier,
            tier_name: tier_name(find_tier(agent.tier, &tiers)),
            permitted_actions: permitted_actions(agent.tier, &tiers),
            last_action_at: receipts.first().map(|r| r.timestamp),
            total_actions: behavior.total_actions,
            success_rate: behavior.success_rate,
            name: agent.name,
            provider: agent.provider,
            spiffe_id: agent.spiffe_id,
            capabilities: agent.capabilities,
            created_at: agent.created_at,
        })
    }

    /// The tier table, ascending.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn tiers(&self) -> Result<Vec<TrustTier>, EngineError> {
        self.store.get_tiers().await
    }

    /// Replaces one tier's definition.
    ///
    /// The tier number in `tier` is ignored in favour of `tier_num`. Updates
    /// are applied one at a time, each validated against the table left by
    /// the previous one. Stored agent tiers are not recomputed until their
    /// next mutation.
    ///
    /// # Errors
    /// - [`EngineError::NotFound`] if `tier_num` is not in the table
    /// - [`EngineError::Validation`] if the resulting table is malformed; the
    ///   old table stays in force
    pub async fn update_tier(
        &self,
        tier_num: u32,
        mut tier: TrustTier,
    ) -> Result<TrustTier, EngineError> {
        let _guard = self.tier_table.lock().await;
        let mut tiers = self.store.get_tiers().await?;
        let slot = tiers
            .iter_mut()
            .find(|t| t.tier == tier_num)
            .ok_or(CoreError::TierNotFound { tier: tier_num })?;
        tier.tier = tier_num;
        *slot = tier.clone();

        validate_tier_table(&tiers)?;
        self.store.put_tiers(tiers).await?;
        tracing::info!(
            tier = tier_num,
            name = %tier.name,
            min_score = tier.min_score,
            max_score = tier.max_score,
            "tier reconfigured"
        );
        Ok(tier)
    }

    /// Fleet-wide counters.
    ///
    /// # Errors
    /// Propagates store failures.
    pub async fn stats(&self) -> Result<DashboardStats, EngineError> {
        let agents = self.store.list_agents().await?;
        let cutoff = Utc::now() - Duration::hours(24);

        let mut agents_by_tier = BTreeMap::new();
        let mut distribution: BTreeMap<String, usize> =
            SCORE_BUCKETS.iter().map(|(label, _)| ((*label).to_owned(), 0)).collect();
        let mut total_actions = 0;
        let mut recent_actions = 0;

        for agent in &agents {
            *agents_by_tier.entry(agent.tier).or_insert(0) += 1;
            let bucket = score_bucket(agent.composite_score.value());
            *distribution.entry(bucket.to_owned()).or_insert(0) += 1;
            let receipts = self.store.get_receipts(agent.id).await?;
            total_actions += receipts.len();
            recent_actions += receipts.iter().filter(|r| r.timestamp >= cutoff).count();
        }

        Ok(DashboardStats {
            total_agents: agents.len(),
            total_actions,
            agents_by_tier,
            recent_actions,
            trust_score_distribution: distribution,
        })
    }

    fn seal(
        &self,
        agent_id: AgentId,
        action: String,
        result: ActionResult,
        timestamp: DateTime<Utc>,
        previous_hash: Option<String>,
    ) -> ActionReceipt {
        let id = ReceiptId::new();
        let signature = self.signer.sign_receipt(
            agent_id,
            &action,
            result,
            &timestamp,
            previous_hash.as_deref(),
        );
        let hash = receipt_hash(id, &signature);
        ActionReceipt::new(id, agent_id, action, result, timestamp, signature, previous_hash, hash)
    }

    /// Writes fresh scores and tier into `agent` from newest-first outcomes.
    fn apply_scores(&self, agent: &mut Agent, outcomes: &[ActionResult], tiers: &[TrustTier]) {
        let scores = score_agent(agent, outcomes, &self.config.weights, self.floor);
        agent.identity_score = scores.identity;
        agent.config_score = scores.config;
        agent.behavior_score = scores.behavior;
        agent.composite_score = scores.composite;
        agent.tier = determine_tier(scores.composite.value(), tiers);
    }

    /// Rescores a stored agent. Caller must hold the agent's lock.
    async fn rescore(
        &self,
        agent: &mut Agent,
        trigger: HistoryTrigger,
    ) -> Result<Vec<TrustEvent>, EngineError> {
        let outcomes = outcomes(&self.store.get_receipts(agent.id).await?);
        let tiers = self.store.get_tiers().await?;
        let old_score = agent.composite_score;
        let old_tier = agent.tier;

        self.apply_scores(agent, &outcomes, &tiers);
        let now = Utc::now();
        self.store.update_agent(agent.clone()).await?;
        self.store.append_history(agent.id, history_point(agent, trigger, now)).await?;

        tracing::info!(
            agent_id = %agent.id,
            %trigger,
            identity = agent.identity_score.value(),
            config = agent.config_score.value(),
            behavior = agent.behavior_score.value(),
            score = agent.composite_score.value(),
            tier = agent.tier,
            "scores updated"
        );

        let mut events = Vec::with_capacity(2);
        if old_score != agent.composite_score {
            events.push(TrustEvent::TrustChanged {
                agent_id: agent.id,
                old_score: old_score.rounded(),
                new_score: agent.composite_score.rounded(),
                trigger,
                timestamp: now,
            });
        }
        if old_tier != agent.tier {
            tracing::info!(agent_id = %agent.id, old_tier, new_tier = agent.tier, "tier changed");
            events.push(TrustEvent::TierChanged {
                agent_id: agent.id,
                old_tier,
                new_tier: agent.tier,
                score: agent.composite_score.rounded(),
                timestamp: now,
            });
        }
        Ok(events)
    }

    fn gate(&self, agent: &Agent, action: &str) -> AuthorizationResponse {
        let required = self.config.action_policy.requirement(action);
        let score = agent.composite_score.value();
        let decision = check_authorization(agent.tier, required.tier, score, required.score);
        AuthorizationResponse {
            allowed: decision.allowed,
            agent_id: agent.id,
            action: action.to_owned(),
            current_tier: agent.tier,
            required_tier: required.tier,
            current_score: agent.composite_score.rounded(),
            required_score: required.score,
            reason: decision.reason.to_string(),
        }
    }

    fn deny(&self, response: &AuthorizationResponse, context: Option<serde_json::Value>) {
        tracing::warn!(
            agent_id = %response.agent_id,
            action = %response.action,
            current_tier = response.current_tier,
            required_tier = response.required_tier,
            reason = %response.reason,
            "authorization denied"
        );
        self.events.publish(TrustEvent::AuthorizationDenied {
            agent_id: response.agent_id,
            action: response.action.clone(),
            current_tier: response.current_tier,
            required_tier: response.required_tier,
            current_score: response.current_score,
            required_score: response.required_score,
            reason: response.reason.clone(),
            context,
            timestamp: Utc::now(),
        });
    }

    fn publish_all(&self, events: Vec<TrustEvent>) {
        for event in events {
            self.events.publish(event);
        }
    }
}

fn outcomes(receipts: &[ActionReceipt]) -> Vec<ActionResult> {
    receipts.iter().map(|r| r.result).collect()
}

fn history_point(
    agent: &Agent,
    trigger: HistoryTrigger,
    timestamp: DateTime<Utc>,
) -> TrustHistoryPoint {
    TrustHistoryPoint {
        timestamp,
        composite_score: agent.composite_score,
        tier: agent.tier,
        trigger,
    }
}

fn tier_name(tier: Option<&TrustTier>) -> String {
    tier.map_or_else(|| UNKNOWN_TIER.to_owned(), |t| t.name.clone())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;
    use trust_core::{Attestation, AttestationKind, Permissions};

    use super::*;
    use crate::MemoryStore;

    fn engine() -> TrustEngine<MemoryStore> {
        match TrustEngine::new(EngineConfig::new("engine-test-secret"), MemoryStore::new()) {
            Ok(e) => e,
            Err(e) => panic!("engine construction failed: {e}"),
        }
    }

    fn registration() -> Registration {
        Registration {
            name: "ops-bot".to_owned(),
            provider: "anthropic".to_owned(),
            spiffe_id: None,
            config_hash: "a".repeat(64),
            capabilities: (0..10).map(|i| format!("cap-{i}")).collect(),
            attestation: None,
        }
    }

    async fn registered(engine: &TrustEngine<MemoryStore>, registration: Registration) -> Agent {
        match engine.register(registration).await {
            Ok(a) => a,
            Err(e) => panic!("register failed: {e}"),
        }
    }

    async fn record(
        engine: &TrustEngine<MemoryStore>,
        agent_id: AgentId,
        result: ActionResult,
    ) -> ActionReceipt {
        let record =
            ActionRecord { agent_id, action: "read_data".to_owned(), result, timestamp: None };
        match engine.record_action(record).await {
            Ok(r) => r,
            Err(e) => panic!("record_action failed: {e}"),
        }
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(matches!(
            TrustEngine::new(EngineConfig::new(""), MemoryStore::new()),
            Err(EngineError::Config(_))
        ));
    }

    #[tokio::test]
    async fn register_scores_identity_and_config_only() {
        let engine = engine();
        let agent = registered(&engine, registration()).await;
        // 0.3 * 0.70 + 0.2 * 1.0 + 0.5 * 0.0
        assert!((agent.composite_score.value() - 0.41).abs() < 1e-9);
        assert_eq!(agent.tier, 1);
        assert!(agent.behavior_score == TrustScore::ZERO);
        let history = match engine.trust_history(agent.id, None).await {
            Ok(h) => h,
            Err(e) => panic!("history failed: {e}"),
        };
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].trigger, HistoryTrigger::Registration);
    }

    #[tokio::test]
    async fn register_rejects_empty_capabilities_before_storing() {
        let engine = engine();
        let mut bad = registration();
        bad.capabilities.clear();
        assert!(matches!(engine.register(bad).await, Err(EngineError::Validation(_))));
        assert!(matches!(engine.store().list_agents().await, Ok(ref a) if a.is_empty()));
    }

    #[tokio::test]
    async fn register_applies_sybil_floor() {
        let engine = match TrustEngine::new(
            EngineConfig::new("s").with_weights(match trust_core::ScoreWeights::new(0.0, 0.0, 1.0) {
                Ok(w) => w,
                Err(e) => panic!("weights: {e}"),
            }),
            MemoryStore::new(),
        ) {
            Ok(e) => e,
            Err(e) => panic!("engine: {e}"),
        };
        let agent = registered(&engine, registration()).await;
        assert!((agent.composite_score.value() - 0.1).abs() < 1e-12);
        assert_eq!(agent.tier, 0);
    }

    #[tokio::test]
    async fn receipts_link_to_predecessor() {
        let engine = engine();
        let agent = registered(&engine, registration()).await;
        let first = record(&engine, agent.id, ActionResult::Success).await;
        let second = record(&engine, agent.id, ActionResult::Failure).await;
        assert!(first.previous_hash.is_none());
        assert_eq!(second.previous_hash.as_deref(), Some(first.receipt_hash.as_str()));
        assert!(engine.signer().verify_receipt(&second));

        let receipts = match engine.receipts(agent.id).await {
            Ok(r) => r,
            Err(e) => panic!("receipts failed: {e}"),
        };
        assert_eq!(receipts[0].id, second.id, "receipts must be newest first");
        assert!(matches!(engine.verify_chain(agent.id).await, Ok(ref r) if r.length == 2));
    }

    #[tokio::test]
    async fn record_action_for_unknown_agent_is_not_found() {
        let engine = engine();
        let record = ActionRecord {
            agent_id: AgentId::new(),
            action: "read_data".to_owned(),
            result: ActionResult::Success,
            timestamp: None,
        };
        assert!(matches!(
            engine.record_action(record).await,
            Err(EngineError::NotFound { kind: "agent", .. })
        ));
    }

    #[tokio::test]
    async fn record_action_rejects_delimiter_and_empty_action() {
        let engine = engine();
        let agent = registered(&engine, registration()).await;
        for action in ["", "  ", "read|data"] {
            let record = ActionRecord {
                agent_id: agent.id,
                action: action.to_owned(),
                result: ActionResult::Success,
                timestamp: None,
            };
            assert!(matches!(engine.record_action(record).await, Err(EngineError::Validation(_))));
        }
    }

    #[tokio::test]
    async fn record_action_rejects_timestamp_before_last_receipt() {
        let engine = engine();
        let agent = registered(&engine, registration()).await;
        let first = record(&engine, agent.id, ActionResult::Success).await;
        let record = ActionRecord {
            agent_id: agent.id,
            action: "read_data".to_owned(),
            result: ActionResult::Success,
            timestamp: Some(first.timestamp - Duration::seconds(1)),
        };
        assert!(matches!(engine.record_action(record).await, Err(EngineError::Validation(_))));
        assert!(matches!(engine.receipts(agent.id).await, Ok(ref r) if r.len() == 1));
    }

    #[tokio::test]
    async fn record_action_rejects_far_future_timestamp() {
        let engine = engine();
        let agent = registered(&engine, registration()).await;
        let future = ActionRecord {
            agent_id: agent.id,
            action: "read_data".to_owned(),
            result: ActionResult::Success,
            timestamp: Some(Utc::now() + Duration::days(365 * 50)),
        };
        assert!(matches!(engine.record_action(future).await, Err(EngineError::Validation(_))));
        assert!(matches!(engine.receipts(agent.id).await, Ok(ref r) if r.is_empty()));

        // The ledger stays usable with engine-clock timestamps.
        let receipt = record(&engine, agent.id, ActionResult::Success).await;
        assert!(receipt.previous_hash.is_none());
    }

    #[tokio::test]
    async fn record_action_accepts_timestamp_within_skew() {
        let engine = engine();
        let agent = registered(&engine, registration()).await;
        let record = ActionRecord {
            agent_id: agent.id,
            action: "read_data".to_owned(),
            result: ActionResult::Success,
            timestamp: Some(Utc::now() + Duration::seconds(MAX_CLOCK_SKEW_SECS / 2)),
        };
        assert!(engine.record_action(record).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_agents_never_allocate_locks() {
        let engine = engine();
        for _ in 0..100 {
            let record = ActionRecord {
                agent_id: AgentId::new(),
                action: "read_data".to_owned(),
                result: ActionResult::Success,
                timestamp: None,
            };
            assert!(matches!(
                engine.record_action(record).await,
                Err(EngineError::NotFound { .. })
            ));
            assert!(matches!(
                engine.report_config(AgentId::new(), "b").await,
                Err(EngineError::NotFound { .. })
            ));
        }
        assert!(engine.locks.is_empty());

        let agent = registered(&engine, registration()).await;
        record(&engine, agent.id, ActionResult::Success).await;
        assert_eq!(engine.locks.len(), 1);
    }

    #[tokio::test]
    async fn successes_raise_tier_and_publish_events() {
        let engine = engine();
        let mut rx = engine.subscribe();
        let agent = registered(&engine, registration()).await;
        let receipt = record(&engine, agent.id, ActionResult::Success).await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.agent_id(), agent.id);
            kinds.push(event.kind());
        }
        assert_eq!(kinds, vec!["action_recorded", "trust_changed", "tier_changed"]);

        let updated = match engine.agent(agent.id).await {
            Ok(a) => a,
            Err(e) => panic!("agent failed: {e}"),
        };
        // 0.21 + 0.2 + 0.5
        assert!((updated.composite_score.value() - 0.91).abs() < 1e-9);
        assert_eq!(updated.tier, 3);
        assert!(receipt.timestamp <= Utc::now());
    }

    #[tokio::test]
    async fn violations_drop_score_to_floor() {
        let engine = engine();
        let agent = registered(&engine, registration()).await;
        for _ in 0..3 {
            record(&engine, agent.id, ActionResult::Violation).await;
        }
        let updated = match engine.agent(agent.id).await {
            Ok(a) => a,
            Err(e) => panic!("agent failed: {e}"),
        };
        assert!(updated.behavior_score == TrustScore::ZERO);
        assert!(updated.composite_score.value() >= 0.1);
    }

    #[tokio::test]
    async fn report_config_counts_only_changes() {
        let engine = engine();
        let agent = registered(&engine, registration()).await;

        let same = match engine.report_config(agent.id, &"a".repeat(64)).await {
            Ok(a) => a,
            Err(e) => panic!("report_config failed: {e}"),
        };
        assert_eq!(same.config_changes, 0);

        let changed = match engine.report_config(agent.id, &"b".repeat(64)).await {
            Ok(a) => a,
            Err(e) => panic!("report_config failed: {e}"),
        };
        assert_eq!(changed.config_changes, 1);
        assert!((changed.config_score.value() - (-0.1f64).exp()).abs() < 1e-12);

        let history = match engine.trust_history(agent.id, Some(1)).await {
            Ok(h) => h,
            Err(e) => panic!("history failed: {e}"),
        };
        assert_eq!(history[0].trigger, HistoryTrigger::ConfigChange);
    }

    #[tokio::test]
    async fn authorize_reports_tier_before_score() {
        let engine = engine();
        let mut rx = engine.subscribe();
        let agent = registered(&engine, registration()).await;

        let response = match engine.authorize(agent.id, "delete_data", None).await {
            Ok(r) => r,
            Err(e) => panic!("authorize failed: {e}"),
        };
        assert!(!response.allowed);
        assert_eq!(response.reason, "Insufficient trust tier (need tier 3, have 1)");
        assert_eq!(response.required_tier, 3);

        match rx.try_recv() {
            Ok(TrustEvent::AuthorizationDenied { action, .. }) => assert_eq!(action, "delete_data"),
            other => panic!("expected denial event, got {other:?}"),
        }

        let allowed = match engine.authorize(agent.id, "read_data", None).await {
            Ok(r) => r,
            Err(e) => panic!("authorize failed: {e}"),
        };
        assert!(allowed.allowed);
        assert_eq!(allowed.reason, "Authorized");
    }

    #[tokio::test]
    async fn authorize_unknown_action_uses_fallback() {
        let engine = engine();
        let agent = registered(&engine, registration()).await;
        let response = match engine.authorize(agent.id, "launch_rockets", None).await {
            Ok(r) => r,
            Err(e) => panic!("authorize failed: {e}"),
        };
        assert_eq!(response.required_tier, 1);
        assert!((response.required_score - 0.3).abs() < f64::EPSILON);
        assert!(response.allowed);
    }

    #[tokio::test]
    async fn authorize_batch_preserves_order_and_isolation() {
        let engine = engine();
        let agent = registered(&engine, registration()).await;
        let actions: Vec<String> = ["write_data", "read_config", "read_data", "read_config"]
            .iter()
            .map(|s| (*s).to_owned())
            .collect();
        let batch = match engine.authorize_batch(agent.id, &actions).await {
            Ok(b) => b,
            Err(e) => panic!("batch failed: {e}"),
        };
        let keys: Vec<&str> = batch.results.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["write_data", "read_config", "read_data"]);
        assert!(!batch.results["write_data"].allowed);
        assert!(batch.results["read_config"].allowed);
        assert!(batch.results["read_data"].allowed);
    }

    #[tokio::test]
    async fn token_round_trip_matches_agent() {
        let engine = engine();
        let agent = registered(&engine, registration()).await;
        let issued = match engine.issue_token(agent.id, None).await {
            Ok(t) => t,
            Err(e) => panic!("issue failed: {e}"),
        };
        assert_eq!(issued.expires_in, 3600);
        let claims = match engine.verify_token(&issued.token) {
            Ok(c) => c,
            Err(e) => panic!("verify failed: {e}"),
        };
        assert_eq!(claims.sub, agent.id);
        assert_eq!(claims.tier, 1);
        assert!((claims.trust_score - 0.41).abs() < 1e-9);
        assert_eq!(claims.permitted_actions, issued.permitted_actions);
        assert!(claims.permitted_actions.contains(&"read_data".to_owned()));
    }

    #[tokio::test]
    async fn zero_token_lifetime_is_rejected() {
        let engine = engine();
        let agent = registered(&engine, registration()).await;
        assert!(matches!(
            engine.issue_token(agent.id, Some(0)).await,
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn breakdown_reports_factors() {
        let engine = engine();
        let mut reg = registration();
        reg.spiffe_id = Some("spiffe://example.org/agent/ops".to_owned());
        reg.attestation = Some(Attestation::of_kind(AttestationKind::X509));
        let agent = registered(&engine, reg).await;
        record(&engine, agent.id, ActionResult::Success).await;

        let breakdown = match engine.trust_breakdown(agent.id).await {
            Ok(b) => b,
            Err(e) => panic!("breakdown failed: {e}"),
        };
        assert!((breakdown.identity_score - 1.0).abs() < 1e-9);
        assert_eq!(breakdown.factors.behavior.total_actions, 1);
        assert_eq!(breakdown.tier_name, "Privileged");
        assert!((breakdown.factors.identity.attestation_strength - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn breakdown_names_missing_tier_unknown() {
        let engine = engine();
        let agent = registered(&engine, registration()).await;
        let tiers = match engine.tiers().await {
            Ok(t) => t,
            Err(e) => panic!("tiers failed: {e}"),
        };
        let without_agent_tier: Vec<TrustTier> =
            tiers.into_iter().filter(|t| t.tier != agent.tier).collect();
        if let Err(e) = engine.store().put_tiers(without_agent_tier).await {
            panic!("put_tiers failed: {e}");
        }
        let breakdown = match engine.trust_breakdown(agent.id).await {
            Ok(b) => b,
            Err(e) => panic!("breakdown failed: {e}"),
        };
        assert_eq!(breakdown.tier_name, "Unknown");
    }

    #[tokio::test]
    async fn agent_card_summarises_activity() {
        let engine = engine();
        let agent = registered(&engine, registration()).await;
        record(&engine, agent.id, ActionResult::Success).await;
        let last = record(&engine, agent.id, ActionResult::Failure).await;

        let card = match engine.agent_card(agent.id).await {
            Ok(c) => c,
            Err(e) => panic!("card failed: {e}"),
        };
        assert_eq!(card.total_actions, 2);
        assert!((card.success_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(card.last_action_at, Some(last.timestamp));
        assert_eq!(card.name, "ops-bot");
    }

    #[tokio::test]
    async fn update_tier_validates_table() {
        let engine = engine();
        let tiers = match engine.tiers().await {
            Ok(t) => t,
            Err(e) => panic!("tiers failed: {e}"),
        };

        let mut overlapping = tiers[1].clone();
        overlapping.max_score = 0.7;
        assert!(matches!(
            engine.update_tier(1, overlapping).await,
            Err(EngineError::Validation(_))
        ));

        let mut renamed = tiers[1].clone();
        renamed.name = "Probation".to_owned();
        renamed.tier = 42;
        let stored = match engine.update_tier(1, renamed).await {
            Ok(t) => t,
            Err(e) => panic!("update failed: {e}"),
        };
        assert_eq!(stored.tier, 1);
        assert!(matches!(engine.tiers().await, Ok(ref t) if t[1].name == "Probation"));

        let missing = TrustTier {
            tier: 9,
            name: "Ghost".to_owned(),
            min_score: 0.0,
            max_score: 1.0,
            description: String::new(),
            permissions: Permissions::All,
        };
        assert!(matches!(
            engine.update_tier(9, missing).await,
            Err(EngineError::NotFound { kind: "tier", .. })
        ));
    }

    #[tokio::test]
    async fn stats_count_agents_and_actions() {
        let engine = engine();
        let a = registered(&engine, registration()).await;
        registered(&engine, registration()).await;
        record(&engine, a.id, ActionResult::Success).await;

        let stats = match engine.stats().await {
            Ok(s) => s,
            Err(e) => panic!("stats failed: {e}"),
        };
        assert_eq!(stats.total_agents, 2);
        assert_eq!(stats.total_actions, 1);
        assert_eq!(stats.recent_actions, 1);
        assert_eq!(stats.agents_by_tier.get(&1), Some(&1));
        assert_eq!(stats.agents_by_tier.get(&3), Some(&1));
        assert_eq!(stats.trust_score_distribution.len(), 4);
        assert_eq!(stats.trust_score_distribution["0.2-0.5"], 1);
        assert_eq!(stats.trust_score_distribution["0.8-1.0"], 1);
    }

    /// Store that lets tests rewrite receipts behind the engine's back, slow
    /// down tier reads and fail agent updates.
    #[derive(Default)]
    struct ScriptedStore {
        inner: MemoryStore,
        tampered: Arc<Mutex<Option<String>>>,
        tier_read_delay: Option<std::time::Duration>,
        fail_updates: Arc<AtomicBool>,
    }

    fn scripted_engine(store: ScriptedStore) -> TrustEngine<ScriptedStore> {
        match TrustEngine::new(EngineConfig::new("scripted"), store) {
            Ok(e) => e,
            Err(e) => panic!("engine: {e}"),
        }
    }

    #[async_trait]
    impl TrustStore for ScriptedStore {
        async fn create_agent(&self, agent: Agent) -> Result<(), EngineError> {
            self.inner.create_agent(agent).await
        }
        async fn get_agent(&self, id: AgentId) -> Result<Option<Agent>, EngineError> {
            self.inner.get_agent(id).await
        }
        async fn update_agent(&self, agent: Agent) -> Result<(), EngineError> {
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(EngineError::Store("agent table unavailable".to_owned()));
            }
            self.inner.update_agent(agent).await
        }
        async fn list_agents(&self) -> Result<Vec<Agent>, EngineError> {
            self.inner.list_agents().await
        }
        async fn append_receipt(&self, receipt: ActionReceipt) -> Result<(), EngineError> {
            self.inner.append_receipt(receipt).await
        }
        async fn get_receipts(&self, agent_id: AgentId) -> Result<Vec<ActionReceipt>, EngineError> {
            let mut receipts = self.inner.get_receipts(agent_id).await?;
            if let Some(action) = self.tampered.lock().await.as_ref() {
                if let Some(oldest) = receipts.last_mut() {
                    oldest.action.clone_from(action);
                }
            }
            Ok(receipts)
        }
        async fn get_last_receipt(
            &self,
            agent_id: AgentId,
        ) -> Result<Option<ActionReceipt>, EngineError> {
            self.inner.get_last_receipt(agent_id).await
        }
        async fn get_tiers(&self) -> Result<Vec<TrustTier>, EngineError> {
            let tiers = self.inner.get_tiers().await?;
            if let Some(delay) = self.tier_read_delay {
                tokio::time::sleep(delay).await;
            }
            Ok(tiers)
        }
        async fn put_tiers(&self, tiers: Vec<TrustTier>) -> Result<(), EngineError> {
            self.inner.put_tiers(tiers).await
        }
        async fn append_history(
            &self,
            agent_id: AgentId,
            point: TrustHistoryPoint,
        ) -> Result<(), EngineError> {
            self.inner.append_history(agent_id, point).await
        }
        async fn get_history(
            &self,
            agent_id: AgentId,
            limit: usize,
        ) -> Result<Vec<TrustHistoryPoint>, EngineError> {
            self.inner.get_history(agent_id, limit).await
        }
    }

    #[tokio::test]
    async fn tampered_receipt_fails_chain_and_publishes() {
        let tampered = Arc::new(Mutex::new(None));
        let engine = scripted_engine(ScriptedStore {
            tampered: Arc::clone(&tampered),
            ..Default::default()
        });
        let agent = match engine.register(registration()).await {
            Ok(a) => a,
            Err(e) => panic!("register failed: {e}"),
        };
        for _ in 0..3 {
            let record = ActionRecord {
                agent_id: agent.id,
                action: "read_data".to_owned(),
                result: ActionResult::Success,
                timestamp: None,
            };
            if let Err(e) = engine.record_action(record).await {
                panic!("record failed: {e}");
            }
        }
        assert!(engine.verify_chain(agent.id).await.is_ok());

        let mut rx = engine.subscribe();
        *tampered.lock().await = Some("delete_database".to_owned());
        let err = engine.verify_chain(agent.id).await;
        assert!(matches!(err, Err(EngineError::SignatureInvalid { .. })), "got {err:?}");
        match rx.try_recv() {
            Ok(TrustEvent::ReceiptChainBroken { index, .. }) => assert_eq!(index, 0),
            other => panic!("expected chain broken event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_tier_updates_are_serialised() {
        let engine = scripted_engine(ScriptedStore {
            tier_read_delay: Some(std::time::Duration::from_millis(20)),
            ..Default::default()
        });
        let tiers = match engine.tiers().await {
            Ok(t) => t,
            Err(e) => panic!("tiers failed: {e}"),
        };
        let mut limited = tiers[1].clone();
        limited.name = "RenamedLimited".to_owned();
        let mut trusted = tiers[2].clone();
        trusted.name = "RenamedTrusted".to_owned();

        let (first, second) =
            tokio::join!(engine.update_tier(1, limited), engine.update_tier(2, trusted));
        assert!(first.is_ok() && second.is_ok());

        let stored = match engine.tiers().await {
            Ok(t) => t,
            Err(e) => panic!("tiers failed: {e}"),
        };
        let names: Vec<&str> = stored.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Untrusted", "RenamedLimited", "RenamedTrusted", "Privileged"]);
        assert!(validate_tier_table(&stored).is_ok());
    }

    #[tokio::test]
    async fn failed_rescore_keeps_receipt_and_next_action_catches_up() {
        let fail_updates = Arc::new(AtomicBool::new(false));
        let engine = scripted_engine(ScriptedStore {
            fail_updates: Arc::clone(&fail_updates),
            ..Default::default()
        });
        let agent = match engine.register(registration()).await {
            Ok(a) => a,
            Err(e) => panic!("register failed: {e}"),
        };
        let record = || ActionRecord {
            agent_id: agent.id,
            action: "read_data".to_owned(),
            result: ActionResult::Success,
            timestamp: None,
        };

        fail_updates.store(true, Ordering::SeqCst);
        assert!(matches!(engine.record_action(record()).await, Err(EngineError::Store(_))));
        assert!(matches!(engine.receipts(agent.id).await, Ok(ref r) if r.len() == 1));
        assert!(matches!(engine.agent(agent.id).await, Ok(ref a) if a.tier == 1));

        fail_updates.store(false, Ordering::SeqCst);
        if let Err(e) = engine.record_action(record()).await {
            panic!("record failed: {e}");
        }
        let updated = match engine.agent(agent.id).await {
            Ok(a) => a,
            Err(e) => panic!("agent failed: {e}"),
        };
        assert_eq!(updated.tier, 3);
        assert!(matches!(engine.verify_chain(agent.id).await, Ok(ref r) if r.length == 2));
    }
}
