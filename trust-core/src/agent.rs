use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::AgentId;
use crate::trust::TrustScore;

/// How an agent's identity claim was attested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum AttestationKind {
    /// X.509 certificate (SVID) attestation.
    X509,
    /// Signed-token (JWT SVID) attestation.
    Jwt,
    /// Shared-secret attestation.
    ApiKey,
    /// The agent vouches for itself.
    SelfDeclared,
}

impl AttestationKind {
    /// Strength contribution of this kind to the identity score.
    #[must_use]
    pub fn strength(self) -> f64 {
        match self {
            Self::X509 => 1.0,
            Self::Jwt => 0.9,
            Self::ApiKey => 0.6,
            Self::SelfDeclared => 0.3,
        }
    }
}

/// Identity attestation evidence presented at registration.
///
/// Only `kind` affects scoring; the evidence fields are carried for
/// downstream verifiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attestation {
    /// Attestation mechanism. Absent kinds score as self-declared.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AttestationKind>,
    /// PEM-encoded X.509 certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<String>,
    /// Certificate chain, leaf first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<Vec<String>>,
    /// Signed identity token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_token: Option<String>,
    /// Hash of a shared secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_hash: Option<String>,
}

impl Attestation {
    /// Creates an attestation of the given kind with no evidence attached.
    #[must_use]
    pub fn of_kind(kind: AttestationKind) -> Self {
        Self { kind: Some(kind), ..Self::default() }
    }

    /// Strength contribution, treating a missing kind as self-declared.
    #[must_use]
    pub fn strength(&self) -> f64 {
        self.kind.unwrap_or(AttestationKind::SelfDeclared).strength()
    }
}

/// Identity facts submitted when registering an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub provider: String,
    /// Namespaced identity reference, e.g. `spiffe://example.org/agent/bot`.
    #[serde(default)]
    pub spiffe_id: Option<String>,
    /// Opaque fingerprint of the agent's configuration.
    pub config_hash: String,
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub attestation: Option<Attestation>,
}

impl Registration {
    /// Trims and validates the registration, returning the normalised form.
    ///
    /// # Errors
    /// Returns [`CoreError::Validation`] naming the first offending field.
    pub fn validate(mut self) -> Result<Self, CoreError> {
        self.name = self.name.trim().to_owned();
        self.provider = self.provider.trim().to_owned();
        self.config_hash = self.config_hash.trim().to_owned();

        check_length("name", &self.name, 1, 100)?;
        check_length("provider", &self.provider, 1, 50)?;
        check_length("config_hash", &self.config_hash, 32, 128)?;

        if self.capabilities.is_empty() {
            return Err(CoreError::validation("capabilities", "must have at least one capability"));
        }

        if let Some(spiffe_id) = self.spiffe_id.as_deref() {
            let spiffe_id = spiffe_id.trim();
            if !is_spiffe_id(spiffe_id) {
                return Err(CoreError::validation(
                    "spiffe_id",
                    format!("'{spiffe_id}' is not of the form spiffe://<trust-domain>/<path>"),
                ));
            }
            self.spiffe_id = Some(spiffe_id.to_owned());
        }

        Ok(self)
    }
}

fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), CoreError> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(CoreError::validation(
            field,
            format!("length {len} outside allowed range {min}..={max}"),
        ));
    }
    Ok(())
}

/// Matches `spiffe://` followed by a trust domain of `[A-Za-z0-9.-]+` and a `/`.
fn is_spiffe_id(value: &str) -> bool {
    let Some(rest) = value.strip_prefix("spiffe://") else {
        return false;
    };
    let Some((domain, _path)) = rest.split_once('/') else {
        return false;
    };
    !domain.is_empty()
        && domain.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

/// A registered agent and its current trust state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub provider: String,
    pub spiffe_id: Option<String>,
    pub config_hash: String,
    pub capabilities: Vec<String>,
    pub attestation: Option<Attestation>,
    pub created_at: DateTime<Utc>,
    pub identity_score: TrustScore,
    pub config_score: TrustScore,
    pub behavior_score: TrustScore,
    /// Composite score with the Sybil floor applied.
    pub composite_score: TrustScore,
    pub tier: u32,
    /// Number of observed configuration fingerprint changes. Never reset.
    pub config_changes: u32,
    pub last_config_hash: Option<String>,
}

impl Agent {
    /// Builds an unscored agent from a validated registration.
    #[must_use]
    pub fn new(id: AgentId, registration: Registration, created_at: DateTime<Utc>) -> Self {
        let last_config_hash = Some(registration.config_hash.clone());
        Self {
            id,
            name: registration.name,
            provider: registration.provider,
            spiffe_id: registration.spiffe_id,
            config_hash: registration.config_hash,
            capabilities: registration.capabilities,
            attestation: registration.attestation,
            created_at,
            identity_score: TrustScore::ZERO,
            config_score: TrustScore::ZERO,
            behavior_score: TrustScore::ZERO,
            composite_score: TrustScore::ZERO,
            tier: 0,
            config_changes: 0,
            last_config_hash,
        }
    }

    /// Records a reported configuration fingerprint.
    ///
    /// Returns `true` if it differs from the last one seen, in which case the
    /// change counter is incremented.
    pub fn observe_config(&mut self, fingerprint: &str) -> bool {
        if self.last_config_hash.as_deref() == Some(fingerprint) {
            return false;
        }
        self.config_changes = self.config_changes.saturating_add(1);
        self.config_hash = fingerprint.to_owned();
        self.last_config_hash = Some(fingerprint.to_owned());
        true
    }
}

/// What caused a trust recomputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum HistoryTrigger {
    Registration,
    Action,
    ConfigChange,
}

impl fmt::Display for HistoryTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Registration => "registration",
            Self::Action => "action",
            Self::ConfigChange => "config_change",
        };
        f.write_str(label)
    }
}

/// One point on an agent's trust timeline. Observability only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustHistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub composite_score: TrustScore,
    pub tier: u32,
    pub trigger: HistoryTrigger,
}
