//! Trust scoring model.
//!
//! Pure functions turning an agent's identity facts, configuration stability
//! and action history into sub-scores, and combining them into a composite.
//! The Sybil floor is applied by callers via [`TrustScore::at_least`], so raw
//! composites stay inspectable.

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::error::CoreError;
use crate::receipt::ActionResult;
use crate::trust::TrustScore;

/// Minimum composite score an agent can hold once scored.
pub const SYBIL_FLOOR: f64 = 0.1;

/// Per-step decay applied to older receipts in the behavior score.
pub const BEHAVIOR_DECAY: f64 = 0.95;

/// Stability decay per configuration change.
pub const CONFIG_DECAY: f64 = 0.1;

const WEIGHT_NAME: f64 = 0.15;
const WEIGHT_PROVIDER: f64 = 0.15;
const WEIGHT_CONFIG_HASH: f64 = 0.15;
const WEIGHT_HAS_CAPABILITIES: f64 = 0.15;
const WEIGHT_CAPABILITY_COUNT: f64 = 0.10;
const WEIGHT_SPIFFE_ID: f64 = 0.15;
const WEIGHT_ATTESTATION: f64 = 0.15;

/// Weights of the three sub-scores in the composite. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWeights")]
pub struct ScoreWeights {
    identity: f64,
    config: f64,
    behavior: f64,
}

#[derive(Deserialize)]
struct RawWeights {
    identity: f64,
    config: f64,
    behavior: f64,
}

impl TryFrom<RawWeights> for ScoreWeights {
    type Error = CoreError;

    fn try_from(raw: RawWeights) -> Result<Self, Self::Error> {
        Self::new(raw.identity, raw.config, raw.behavior)
    }
}

impl ScoreWeights {
    /// Creates a validated weight set.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidWeights`] if any weight is negative or not
    /// finite, or the weights do not sum to 1.0 (within `1e-9`).
    pub fn new(identity: f64, config: f64, behavior: f64) -> Result<Self, CoreError> {
        let sum = identity + config + behavior;
        let all_valid = [identity, config, behavior].iter().all(|w| w.is_finite() && *w >= 0.0);
        if !all_valid || (sum - 1.0).abs() > 1e-9 {
            return Err(CoreError::InvalidWeights { sum });
        }
        Ok(Self { identity, config, behavior })
    }

    #[must_use]
    pub fn identity(&self) -> f64 {
        self.identity
    }

    #[must_use]
    pub fn config(&self) -> f64 {
        self.config
    }

    #[must_use]
    pub fn behavior(&self) -> f64 {
        self.behavior
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { identity: 0.3, config: 0.2, behavior: 0.5 }
    }
}

/// Factor breakdown behind an identity score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdentityFactors {
    pub has_name: f64,
    pub has_provider: f64,
    pub has_config_hash: f64,
    pub has_capabilities: f64,
    pub capabilities_count: f64,
    pub has_spiffe_id: f64,
    pub has_attestation: f64,
    pub attestation_strength: f64,
}

/// Factor breakdown behind a configuration score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfigFactors {
    pub config_changes: u32,
    pub stability_score: f64,
    pub known_good_boost: f64,
}

/// Factor breakdown behind a behavior score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BehaviorFactors {
    pub total_actions: usize,
    pub successes: usize,
    pub failures: usize,
    pub violations: usize,
    pub success_rate: f64,
    pub weighted_score: f64,
}

fn presence(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}

/// Weighted completeness of an agent's identity facts.
///
/// Missing optional facts contribute `0.0`; this never fails.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn identity_score(agent: &Agent) -> (TrustScore, IdentityFactors) {
    let factors = IdentityFactors {
        has_name: presence(!agent.name.is_empty()),
        has_provider: presence(!agent.provider.is_empty()),
        has_config_hash: presence(!agent.config_hash.is_empty()),
        has_capabilities: presence(!agent.capabilities.is_empty()),
        capabilities_count: (agent.capabilities.len() as f64 / 10.0).min(1.0),
        has_spiffe_id: presence(agent.spiffe_id.as_deref().is_some_and(|s| !s.is_empty())),
        has_attestation: presence(agent.attestation.is_some()),
        attestation_strength: agent.attestation.as_ref().map_or(0.0, |a| a.strength()),
    };

    let score = factors.has_name * WEIGHT_NAME
        + factors.has_provider * WEIGHT_PROVIDER
        + factors.has_config_hash * WEIGHT_CONFIG_HASH
        + factors.has_capabilities * WEIGHT_HAS_CAPABILITIES
        + factors.capabilities_count * WEIGHT_CAPABILITY_COUNT
        + factors.has_spiffe_id * WEIGHT_SPIFFE_ID
        + factors.attestation_strength * WEIGHT_ATTESTATION;

    (TrustScore::clamped(score), factors)
}

/// Configuration stability: `exp(-0.1 * changes)`, exactly `1.0` with no changes.
#[must_use]
pub fn config_score(config_changes: u32) -> (TrustScore, ConfigFactors) {
    let stability = if config_changes == 0 {
        1.0
    } else {
        (-CONFIG_DECAY * f64::from(config_changes)).exp()
    };
    let factors =
        ConfigFactors { config_changes, stability_score: stability, known_good_boost: 0.0 };
    (TrustScore::clamped(stability), factors)
}

/// Recency-weighted outcome average over `outcomes`, newest first.
///
/// The `i`-th most recent outcome is weighted `0.95^i`. Success counts
/// `+1.0`, failure `+0.3`, violation `-1.0`. An empty history scores `0.0`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn behavior_score(outcomes: &[ActionResult]) -> (TrustScore, BehaviorFactors) {
    if outcomes.is_empty() {
        let factors = BehaviorFactors {
            total_actions: 0,
            successes: 0,
            failures: 0,
            violations: 0,
            success_rate: 0.0,
            weighted_score: 0.0,
        };
        return (TrustScore::ZERO, factors);
    }

    let mut successes = 0;
    let mut failures = 0;
    let mut violations = 0;
    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    let mut weight = 1.0;

    for outcome in outcomes {
        let contribution = match outcome {
            ActionResult::Success => {
                successes += 1;
                1.0
            }
            ActionResult::Failure => {
                failures += 1;
                0.3
            }
            ActionResult::Violation => {
                violations += 1;
                -1.0
            }
        };
        weighted += contribution * weight;
        total_weight += weight;
        weight *= BEHAVIOR_DECAY;
    }

    let score = TrustScore::clamped(weighted / total_weight);
    let factors = BehaviorFactors {
        total_actions: outcomes.len(),
        successes,
        failures,
        violations,
        success_rate: successes as f64 / outcomes.len() as f64,
        weighted_score: score.value(),
    };
    (score, factors)
}

/// Linear combination of the sub-scores, clamped to `[0, 1]`. No floor.
#[must_use]
pub fn composite_score(
    weights: &ScoreWeights,
    identity: TrustScore,
    config: TrustScore,
    behavior: TrustScore,
) -> TrustScore {
    TrustScore::clamped(
        weights.identity * identity.value()
            + weights.config * config.value()
            + weights.behavior * behavior.value(),
    )
}

/// All three sub-scores and the floored composite for an agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreSet {
    pub identity: TrustScore,
    pub config: TrustScore,
    pub behavior: TrustScore,
    /// Composite with `floor` applied.
    pub composite: TrustScore,
}

/// Scores an agent against its newest-first outcome history.
#[must_use]
pub fn score_agent(
    agent: &Agent,
    outcomes: &[ActionResult],
    weights: &ScoreWeights,
    floor: TrustScore,
) -> ScoreSet {
    let (identity, _) = identity_score(agent);
    let (config, _) = config_score(agent.config_changes);
    let (behavior, _) = behavior_score(outcomes);
    let composite = composite_score(weights, identity, config, behavior).at_least(floor);
    ScoreSet { identity, config, behavior, composite }
}
