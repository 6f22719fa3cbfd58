//! Authorization gate and the action requirement policy.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Tier and score an action demands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub tier: u32,
    pub score: f64,
}

impl Requirement {
    #[must_use]
    pub const fn new(tier: u32, score: f64) -> Self {
        Self { tier, score }
    }
}

/// Static action-to-requirement table with a fallback for unknown actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPolicy {
    requirements: HashMap<String, Requirement>,
    fallback: Requirement,
}

impl ActionPolicy {
    /// Creates a policy from explicit entries and a fallback requirement.
    #[must_use]
    pub fn new(
        requirements: impl IntoIterator<Item = (String, Requirement)>,
        fallback: Requirement,
    ) -> Self {
        Self { requirements: requirements.into_iter().collect(), fallback }
    }

    /// Requirement for `action`, or the fallback if it is not listed.
    #[must_use]
    pub fn requirement(&self, action: &str) -> Requirement {
        self.requirements.get(action).copied().unwrap_or(self.fallback)
    }
}

impl Default for ActionPolicy {
    fn default() -> Self {
        crate::defaults::default_action_policy()
    }
}

/// Why an authorization check came out the way it did.
///
/// `Display` renders the exact user-visible reason text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[non_exhaustive]
pub enum Reason {
    Authorized,
    InsufficientTier { required: u32, actual: u32 },
    InsufficientScore { required: f64, actual: f64 },
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authorized => f.write_str("Authorized"),
            Self::InsufficientTier { required, actual } => {
                write!(f, "Insufficient trust tier (need tier {required}, have {actual})")
            }
            Self::InsufficientScore { required, actual } => {
                write!(f, "Insufficient trust score (need {required:.2}, have {actual:.2})")
            }
        }
    }
}

/// Outcome of the tier/score gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub allowed: bool,
    pub reason: Reason,
}

/// Allows iff `agent_tier >= required_tier` and `agent_score >= required_score`.
///
/// When both conditions fail the tier failure is reported.
#[must_use]
pub fn check_authorization(
    agent_tier: u32,
    required_tier: u32,
    agent_score: f64,
    required_score: f64,
) -> Decision {
    if agent_tier < required_tier {
        return Decision {
            allowed: false,
            reason: Reason::InsufficientTier { required: required_tier, actual: agent_tier },
        };
    }
    if agent_score < required_score {
        return Decision {
            allowed: false,
            reason: Reason::InsufficientScore { required: required_score, actual: agent_score },
        };
    }
    Decision { allowed: true, reason: Reason::Authorized }
}
