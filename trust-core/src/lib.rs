//! Core types for the agent trust gateway.
//!
//! Defines the domain model (agents, action receipts, trust tiers) and the
//! pure algorithms over it: the scoring model, the tier resolver and the
//! authorization gate. Nothing here performs I/O or holds shared state.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod agent;
pub mod authz;
pub mod defaults;
pub mod error;
pub mod id;
pub mod receipt;
pub mod scoring;
pub mod tier;
pub mod trust;

pub use agent::{
    Agent, Attestation, AttestationKind, HistoryTrigger, Registration, TrustHistoryPoint,
};
pub use authz::{check_authorization, ActionPolicy, Decision, Reason, Requirement};
pub use error::CoreError;
pub use id::{AgentId, ReceiptId};
pub use receipt::{canonical_timestamp, receipt_time, ActionReceipt, ActionResult};
pub use scoring::{ScoreSet, ScoreWeights, SYBIL_FLOOR};
pub use tier::{determine_tier, permitted_actions, Permissions, TrustTier};
pub use trust::TrustScore;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_score_valid_range_accepts() {
        assert!(TrustScore::new(0.0).is_ok());
        assert!(TrustScore::new(0.5).is_ok());
        assert!(TrustScore::new(1.0).is_ok());
    }

    #[test]
    fn trust_score_out_of_range_rejects() {
        assert!(TrustScore::new(-0.1).is_err());
        assert!(TrustScore::new(1.1).is_err());
        assert!(TrustScore::new(f64::NAN).is_err());
        assert!(TrustScore::new(f64::INFINITY).is_err());
    }

    #[test]
    fn trust_score_clamped_saturates() {
        assert_eq!(TrustScore::clamped(-3.0), TrustScore::ZERO);
        assert_eq!(TrustScore::clamped(7.0), TrustScore::ONE);
        assert_eq!(TrustScore::clamped(f64::NAN), TrustScore::ZERO);
    }

    #[test]
    fn trust_score_at_least_raises_to_floor() {
        let floor = TrustScore::clamped(SYBIL_FLOOR);
        assert_eq!(TrustScore::clamped(0.02).at_least(floor), floor);
        assert_eq!(TrustScore::clamped(0.4).at_least(floor), TrustScore::clamped(0.4));
    }

    #[test]
    fn trust_score_rounded_to_three_decimals() {
        assert!((TrustScore::clamped(0.123_456).rounded() - 0.123).abs() < f64::EPSILON);
        assert!((TrustScore::clamped(0.6666).rounded() - 0.667).abs() < f64::EPSILON);
    }

    #[test]
    fn trust_score_display_formats_to_4_decimal_places() {
        assert_eq!(TrustScore::clamped(0.5).to_string(), "0.5000");
    }

    #[test]
    fn trust_score_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<TrustScore>("0.25").is_ok());
        assert!(serde_json::from_str::<TrustScore>("1.5").is_err());
    }

    #[test]
    fn agent_id_parses_from_display() {
        let id = AgentId::new();
        let parsed: AgentId = match id.to_string().parse() {
            Ok(p) => p,
            Err(e) => panic!("failed to parse agent id: {e}"),
        };
        assert_eq!(parsed, id);
    }

    #[test]
    fn agent_id_serializes_as_bare_uuid() {
        let id = AgentId::from(uuid::Uuid::nil());
        let json = match serde_json::to_string(&id) {
            Ok(s) => s,
            Err(e) => panic!("serialization failed: {e}"),
        };
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");
    }

    #[test]
    fn default_tiers_cover_unit_interval() {
        let tiers = defaults::default_tiers();
        assert_eq!(tiers.len(), 4);
        assert!(tiers[0].min_score.abs() < f64::EPSILON);
        assert!((tiers[3].max_score - 1.0).abs() < f64::EPSILON);
        assert_eq!(tiers[3].permissions, Permissions::All);
        assert_eq!(tiers[0].name, "Untrusted");
        assert_eq!(tiers[3].name, "Privileged");
    }
}
