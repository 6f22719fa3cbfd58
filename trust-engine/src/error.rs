//! Error types for the engine crate.

use trust_core::{AgentId, CoreError};

/// Errors surfaced by the trust engine and its collaborators.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EngineError {
    /// An agent or tier does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Input was rejected before any state was touched.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A receipt or token failed signature verification.
    #[error("signature invalid: {reason}")]
    SignatureInvalid { reason: String },

    /// An agent's receipt chain does not link up.
    #[error("receipt chain broken for agent {agent_id} at index {index}: {reason}")]
    ChainBroken { agent_id: AgentId, index: usize, reason: String },

    /// A capability token is past its expiry.
    #[error("token expired")]
    TokenExpired,

    /// Engine configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The persistence collaborator failed.
    #[error("store error: {0}")]
    Store(String),
}

impl EngineError {
    pub(crate) fn agent_not_found(id: AgentId) -> Self {
        Self::NotFound { kind: "agent", id: id.to_string() }
    }

    pub(crate) fn tier_not_found(tier: u32) -> Self {
        Self::NotFound { kind: "tier", id: tier.to_string() }
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::TierNotFound { tier } => Self::tier_not_found(tier),
            CoreError::InvalidWeights { .. } => Self::Config(err.to_string()),
            other => Self::Validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_validation_maps_to_validation() {
        let err = EngineError::from(CoreError::InvalidTierTable { reason: "gap".to_owned() });
        assert!(matches!(err, EngineError::Validation(ref msg) if msg.contains("gap")));
    }

    #[test]
    fn core_tier_not_found_maps_to_not_found() {
        let err = EngineError::from(CoreError::TierNotFound { tier: 7 });
        assert!(matches!(err, EngineError::NotFound { kind: "tier", ref id } if id == "7"));
    }

    #[test]
    fn chain_broken_display_names_index() {
        let err = EngineError::ChainBroken {
            agent_id: AgentId::from(uuid::Uuid::nil()),
            index: 3,
            reason: "previous_hash mismatch".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("index 3"), "Display must include the failing index");
        assert!(msg.contains("previous_hash mismatch"));
    }
}
