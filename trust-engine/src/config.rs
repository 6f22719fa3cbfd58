//! Engine configuration.

use std::fmt;

use serde::{Deserialize, Serialize};
use trust_core::{ActionPolicy, ScoreWeights, TrustScore, SYBIL_FLOOR};

use crate::EngineError;

/// Default capability token lifetime in seconds.
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Default `iss` claim on capability tokens.
pub const DEFAULT_ISSUER: &str = "trust-gateway";

/// Configuration for a [`crate::TrustEngine`].
#[derive(Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct EngineConfig {
    /// Process-wide secret keying receipt signatures.
    pub signing_secret: Vec<u8>,

    /// Secret keying capability tokens. Falls back to `signing_secret`.
    #[serde(default)]
    pub token_secret: Option<Vec<u8>>,

    /// `iss` claim written to and required on capability tokens.
    #[serde(default = "default_issuer")]
    pub token_issuer: String,

    /// Token lifetime used when the caller does not supply one.
    #[serde(default = "default_ttl")]
    pub default_token_ttl_secs: u64,

    /// Composite score weights.
    #[serde(default)]
    pub weights: ScoreWeights,

    /// Minimum composite score held by any scored agent.
    #[serde(default = "default_floor")]
    pub sybil_floor: f64,

    /// Action requirement table used by authorization.
    #[serde(default)]
    pub action_policy: ActionPolicy,

    /// Buffered events per subscriber before the slowest one lags.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_issuer() -> String {
    DEFAULT_ISSUER.to_owned()
}

fn default_ttl() -> u64 {
    DEFAULT_TOKEN_TTL_SECS
}

fn default_floor() -> f64 {
    SYBIL_FLOOR
}

fn default_event_capacity() -> usize {
    1024
}

impl EngineConfig {
    /// Create a config with the given signing secret and default policy.
    ///
    /// # Arguments
    /// - `signing_secret`: key for receipt signatures and, unless overridden, tokens
    #[must_use]
    pub fn new(signing_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            signing_secret: signing_secret.into(),
            token_secret: None,
            token_issuer: default_issuer(),
            default_token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            weights: ScoreWeights::default(),
            sybil_floor: SYBIL_FLOOR,
            action_policy: ActionPolicy::default(),
            event_capacity: default_event_capacity(),
        }
    }

    /// Use a separate secret for capability tokens.
    #[must_use]
    pub fn with_token_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.token_secret = Some(secret.into());
        self
    }

    /// Override the composite weights.
    #[must_use]
    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Override the action requirement table.
    #[must_use]
    pub fn with_action_policy(mut self, policy: ActionPolicy) -> Self {
        self.action_policy = policy;
        self
    }

    /// Override the token issuer.
    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.token_issuer = issuer.into();
        self
    }

    /// Secret used for capability tokens.
    #[must_use]
    pub fn token_secret(&self) -> &[u8] {
        self.token_secret.as_deref().unwrap_or(&self.signing_secret)
    }

    /// Checks the config and returns the Sybil floor as a score.
    ///
    /// # Errors
    /// Returns [`EngineError::Config`] for an empty secret or issuer, a zero
    /// token lifetime or event capacity, or a floor outside `[0, 1]`.
    pub fn validate(&self) -> Result<TrustScore, EngineError> {
        if self.signing_secret.is_empty() {
            return Err(EngineError::Config("signing secret must not be empty".to_owned()));
        }
        if self.token_secret.as_ref().is_some_and(Vec::is_empty) {
            return Err(EngineError::Config("token secret must not be empty".to_owned()));
        }
        if self.token_issuer.trim().is_empty() {
            return Err(EngineError::Config("token issuer must not be empty".to_owned()));
        }
        if self.default_token_ttl_secs == 0 {
            return Err(EngineError::Config("default token lifetime must be positive".to_owned()));
        }
        if self.event_capacity == 0 {
            return Err(EngineError::Config("event capacity must be positive".to_owned()));
        }
        TrustScore::new(self.sybil_floor).map_err(|e| EngineError::Config(e.to_string()))
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("signing_secret", &"<redacted>")
            .field("token_secret", &self.token_secret.as_ref().map(|_| "<redacted>"))
            .field("token_issuer", &self.token_issuer)
            .field("default_token_ttl_secs", &self.default_token_ttl_secs)
            .field("weights", &self.weights)
            .field("sybil_floor", &self.sybil_floor)
            .field("event_capacity", &self.event_capacity)
            .finish_non_exhaustive()
    }
}
