//! Receipt chain integrity walk.

use std::fmt;

use serde::Serialize;
use trust_core::{ActionReceipt, AgentId};

use crate::signing::{receipt_hash, ReceiptSigner};
use crate::EngineError;

/// Summary of a chain that verified end to end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainReport {
    pub agent_id: AgentId,
    /// Number of receipts walked.
    pub length: usize,
    /// `receipt_hash` of the newest receipt, absent for an empty chain.
    pub head: Option<String>,
}

/// Which check a receipt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Signature does not match the signed fields.
    Signature,
    /// Ownership, `previous_hash` or `receipt_hash` does not line up.
    Link,
}

/// First integrity failure found in a chain walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainFault {
    pub agent_id: AgentId,
    /// Position of the failing receipt, oldest first.
    pub index: usize,
    pub kind: FaultKind,
    pub reason: String,
}

impl fmt::Display for ChainFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent {} receipt {}: {}", self.agent_id, self.index, self.reason)
    }
}

impl From<ChainFault> for EngineError {
    fn from(fault: ChainFault) -> Self {
        match fault.kind {
            FaultKind::Signature => EngineError::SignatureInvalid {
                reason: format!(
                    "receipt at index {} of agent {}: {}",
                    fault.index, fault.agent_id, fault.reason
                ),
            },
            FaultKind::Link => EngineError::ChainBroken {
                agent_id: fault.agent_id,
                index: fault.index,
                reason: fault.reason,
            },
        }
    }
}

/// Walks `receipts` oldest-first and checks every link.
///
/// At each index the receipt must belong to `agent_id`, carry a
/// `previous_hash` equal to the prior receipt's `receipt_hash` (absent only at
/// index 0), carry a valid signature, and carry
/// `receipt_hash == SHA-256(id|signature)`.
///
/// # Errors
/// Returns the first [`ChainFault`]. Converting it into an [`EngineError`]
/// yields `SignatureInvalid` for forged signatures and `ChainBroken` for any
/// linkage failure.
pub fn verify_chain(
    signer: &ReceiptSigner,
    agent_id: AgentId,
    receipts: &[ActionReceipt],
) -> Result<ChainReport, ChainFault> {
    let fault = |index: usize, kind: FaultKind, reason: String| ChainFault {
        agent_id,
        index,
        kind,
        reason,
    };

    let mut expected_previous: Option<&str> = None;
    for (index, receipt) in receipts.iter().enumerate() {
        if receipt.agent_id != agent_id {
            return Err(fault(
                index,
                FaultKind::Link,
                format!("receipt {} belongs to agent {}", receipt.id, receipt.agent_id),
            ));
        }

        if receipt.previous_hash.as_deref() != expected_previous {
            return Err(fault(
                index,
                FaultKind::Link,
                format!(
                    "previous_hash {:?} does not match preceding receipt_hash {:?}",
                    receipt.previous_hash, expected_previous
                ),
            ));
        }

        if !signer.verify_receipt(receipt) {
            return Err(fault(
                index,
                FaultKind::Signature,
                format!("signature of receipt {} does not verify", receipt.id),
            ));
        }

        if receipt_hash(receipt.id, &receipt.signature) != receipt.receipt_hash {
            return Err(fault(
                index,
                FaultKind::Link,
                format!("receipt_hash of {} does not match", receipt.id),
            ));
        }

        expected_previous = Some(&receipt.receipt_hash);
    }

    Ok(ChainReport {
        agent_id,
        length: receipts.len(),
        head: receipts.last().map(|r| r.receipt_hash.clone()),
    })
}
