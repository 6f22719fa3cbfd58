use std::fmt;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{AgentId, ReceiptId};

/// Outcome of a recorded agent action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ActionResult {
    Success,
    Failure,
    Violation,
}

impl ActionResult {
    /// Wire form used in receipt signatures.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Violation => "violation",
        }
    }
}

impl fmt::Display for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A signed, hash-linked record of one agent action.
///
/// Receipts are immutable once created. `previous_hash` is the
/// `receipt_hash` of the agent's preceding receipt, absent for the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ActionReceipt {
    pub id: ReceiptId,
    pub agent_id: AgentId,
    pub action: String,
    pub result: ActionResult,
    pub timestamp: DateTime<Utc>,
    /// Hex HMAC-SHA256 over the signed fields.
    pub signature: String,
    pub previous_hash: Option<String>,
    /// Hex SHA-256 of `id | signature`.
    pub receipt_hash: String,
}

impl ActionReceipt {
    /// Assembles a receipt from already computed signature and hash.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ReceiptId,
        agent_id: AgentId,
        action: String,
        result: ActionResult,
        timestamp: DateTime<Utc>,
        signature: String,
        previous_hash: Option<String>,
        receipt_hash: String,
    ) -> Self {
        Self { id, agent_id, action, result, timestamp, signature, previous_hash, receipt_hash }
    }
}

/// Truncates a timestamp to the microsecond precision receipts carry.
#[must_use]
pub fn receipt_time(timestamp: DateTime<Utc>) -> DateTime<Utc> {
    timestamp.trunc_subsecs(6)
}

/// Canonical string form of a receipt timestamp used in signatures:
/// RFC 3339, UTC, six fractional digits, `Z` suffix.
#[must_use]
pub fn canonical_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}
