//! Receipt signing and hashing.
//!
//! Signature: hex `HMAC-SHA256(secret, agent_id|action|result|timestamp|previous_hash)`
//! with an empty string standing in for an absent `previous_hash`.
//! Chain hash: hex `SHA-256(receipt_id|signature)`.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use trust_core::{canonical_timestamp, ActionReceipt, AgentId, ReceiptId};

use crate::EngineError;

type HmacSha256 = Hmac<Sha256>;

/// Field delimiter in signed and hashed messages.
pub const DELIMITER: char = '|';

/// Fields covered by a receipt signature, in signing order.
#[derive(Debug, Clone, Copy)]
pub struct SignedFields<'a> {
    pub agent_id: &'a str,
    pub action: &'a str,
    pub result: &'a str,
    pub timestamp: &'a str,
    pub previous_hash: Option<&'a str>,
}

impl SignedFields<'_> {
    fn message(&self) -> String {
        format!(
            "{agent}{d}{action}{d}{result}{d}{ts}{d}{prev}",
            agent = self.agent_id,
            action = self.action,
            result = self.result,
            ts = self.timestamp,
            prev = self.previous_hash.unwrap_or(""),
            d = DELIMITER,
        )
    }
}

/// Keyed signer for action receipts.
///
/// Stateless apart from the key; safe to share across tasks.
#[derive(Clone)]
pub struct ReceiptSigner {
    mac: HmacSha256,
}

impl ReceiptSigner {
    /// Create a signer keyed with `secret`.
    ///
    /// # Errors
    /// Returns [`EngineError::Config`] if `secret` is empty.
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, EngineError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(EngineError::Config("signing secret must not be empty".to_owned()));
        }
        let mac = HmacSha256::new_from_slice(&secret)
            .map_err(|e| EngineError::Config(format!("invalid signing secret: {e}")))?;
        Ok(Self { mac })
    }

    /// Signs the given fields, returning a 64-char hex signature.
    #[must_use]
    pub fn sign(&self, fields: &SignedFields<'_>) -> String {
        let mut mac = self.mac.clone();
        mac.update(fields.message().as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Recomputes the signature and compares it in constant time.
    ///
    /// Malformed (non-hex or wrong length) signatures verify as `false`.
    #[must_use]
    pub fn verify(&self, fields: &SignedFields<'_>, signature: &str) -> bool {
        let Ok(presented) = hex::decode(signature) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(fields.message().as_bytes());
        let expected = mac.finalize().into_bytes();
        if presented.len() != expected.len() {
            return false;
        }
        expected.as_slice().ct_eq(presented.as_slice()).into()
    }

    /// Signs a receipt's fields as they will be stored.
    #[must_use]
    pub fn sign_receipt(
        &self,
        agent_id: AgentId,
        action: &str,
        result: trust_core::ActionResult,
        timestamp: &chrono::DateTime<chrono::Utc>,
        previous_hash: Option<&str>,
    ) -> String {
        let agent_id = agent_id.to_string();
        let timestamp = canonical_timestamp(timestamp);
        self.sign(&SignedFields {
            agent_id: &agent_id,
            action,
            result: result.as_str(),
            timestamp: &timestamp,
            previous_hash,
        })
    }

    /// Verifies a stored receipt's signature.
    #[must_use]
    pub fn verify_receipt(&self, receipt: &ActionReceipt) -> bool {
        let agent_id = receipt.agent_id.to_string();
        let timestamp = canonical_timestamp(&receipt.timestamp);
        self.verify(
            &SignedFields {
                agent_id: &agent_id,
                action: &receipt.action,
                result: receipt.result.as_str(),
                timestamp: &timestamp,
                previous_hash: receipt.previous_hash.as_deref(),
            },
            &receipt.signature,
        )
    }
}

impl fmt::Debug for ReceiptSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiptSigner").finish_non_exhaustive()
    }
}

/// Chain hash of a receipt: hex `SHA-256(receipt_id|signature)`.
#[must_use]
pub fn hash_receipt(receipt_id: &str, signature: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(receipt_id.as_bytes());
    hasher.update([DELIMITER as u8]);
    hasher.update(signature.as_bytes());
    hex::encode(hasher.finalize())
}

/// Chain hash for a typed receipt id.
#[must_use]
pub fn receipt_hash(receipt_id: ReceiptId, signature: &str) -> String {
    hash_receipt(&receipt_id.to_string(), signature)
}
