//! Capability token issuance and verification (HS256 JWT).
//!
//! A token is a snapshot: its permitted actions reflect the agent's tier at
//! issuance and are not refreshed until a new token is issued.

use std::fmt;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use trust_core::{Agent, AgentId, TrustTier};

use crate::EngineError;

/// Claims carried by a capability token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityClaims {
    /// Agent id.
    pub sub: AgentId,
    /// Agent display name.
    pub name: String,
    pub tier: u32,
    /// Composite score rounded to three decimals.
    pub trust_score: f64,
    /// Actions allowed at `tier`; `["*"]` for all actions.
    pub permitted_actions: Vec<String>,
    /// Issued at (Unix seconds).
    pub iat: i64,
    /// Expiry (Unix seconds).
    pub exp: i64,
    pub iss: String,
}

/// Response to a token request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: u64,
    pub tier: u32,
    pub permitted_actions: Vec<String>,
}

/// Signs and verifies capability tokens with a shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
}

impl TokenIssuer {
    /// Create an issuer keyed with `secret` that stamps and requires `issuer`.
    #[must_use]
    pub fn new(secret: &[u8], issuer: impl Into<String>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
        }
    }

    /// Builds the claims for `agent` at `issued_at`.
    ///
    /// # Errors
    /// Returns [`EngineError::Validation`] if `expires_in` is zero or overflows.
    pub fn claims_for(
        &self,
        agent: &Agent,
        tiers: &[TrustTier],
        expires_in: u64,
        issued_at: DateTime<Utc>,
    ) -> Result<CapabilityClaims, EngineError> {
        if expires_in == 0 {
            return Err(EngineError::Validation("expires_in must be positive".to_owned()));
        }
        let ttl = i64::try_from(expires_in)
            .map_err(|_| EngineError::Validation(format!("expires_in {expires_in} too large")))?;
        let iat = issued_at.timestamp();
        let exp = iat
            .checked_add(ttl)
            .ok_or_else(|| EngineError::Validation(format!("expires_in {expires_in} too large")))?;

        Ok(CapabilityClaims {
            sub: agent.id,
            name: agent.name.clone(),
            tier: agent.tier,
            trust_score: agent.composite_score.rounded(),
            permitted_actions: trust_core::permitted_actions(agent.tier, tiers),
            iat,
            exp,
            iss: self.issuer.clone(),
        })
    }

    /// Encodes and signs `claims`.
    ///
    /// # Errors
    /// Returns [`EngineError::Validation`] if the claims cannot be encoded.
    pub fn encode(&self, claims: &CapabilityClaims) -> Result<String, EngineError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| EngineError::Validation(format!("token encoding failed: {e}")))
    }

    /// Issues a token for `agent`, valid for `expires_in` seconds from `issued_at`.
    ///
    /// # Errors
    /// See [`TokenIssuer::claims_for`] and [`TokenIssuer::encode`].
    pub fn issue(
        &self,
        agent: &Agent,
        tiers: &[TrustTier],
        expires_in: u64,
        issued_at: DateTime<Utc>,
    ) -> Result<IssuedToken, EngineError> {
        let claims = self.claims_for(agent, tiers, expires_in, issued_at)?;
        let token = self.encode(&claims)?;
        tracing::info!(
            agent_id = %agent.id,
            tier = agent.tier,
            score = claims.trust_score,
            expires_in,
            "capability token issued"
        );
        Ok(IssuedToken {
            token,
            expires_in,
            tier: claims.tier,
            permitted_actions: claims.permitted_actions,
        })
    }

    /// Decodes `token`, checking signature, algorithm, issuer and expiry.
    ///
    /// # Errors
    /// Returns [`EngineError::TokenExpired`] past `exp`, otherwise
    /// [`EngineError::SignatureInvalid`] for any malformed or tampered token.
    pub fn verify(&self, token: &str) -> Result<CapabilityClaims, EngineError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "sub"]);

        jsonwebtoken::decode::<CapabilityClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => EngineError::TokenExpired,
                _ => EngineError::SignatureInvalid { reason: format!("capability token: {e}") },
            })
    }
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer").field("issuer", &self.issuer).finish_non_exhaustive()
    }
}
