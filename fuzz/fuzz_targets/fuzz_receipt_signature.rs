//! Fuzz target: receipt signature verification.
//!
//! Arbitrary actions and signatures must never panic the verifier, and a
//! freshly computed signature must always verify.

#![no_main]

use chrono::{TimeZone, Utc};
use libfuzzer_sys::fuzz_target;
use trust_core::{ActionResult, AgentId};
use trust_engine::signing::SignedFields;
use trust_engine::ReceiptSigner;

fuzz_target!(|data: &[u8]| {
    let Ok(signer) = ReceiptSigner::new("fuzz-secret") else {
        return;
    };
    let text = String::from_utf8_lossy(data);
    let mid = (0..=text.len() / 2).rev().find(|&i| text.is_char_boundary(i)).unwrap_or(0);
    let (action, claimed) = text.split_at(mid);

    let agent_id = AgentId::new();
    let Some(timestamp) = Utc.timestamp_opt(1_700_000_000, 0).single() else {
        return;
    };
    let signature =
        signer.sign_receipt(agent_id, action, ActionResult::Success, &timestamp, Some(claimed));
    assert_eq!(signature.len(), 64);

    let agent = agent_id.to_string();
    let stamp = trust_core::canonical_timestamp(&timestamp);
    let fields = SignedFields {
        agent_id: &agent,
        action,
        result: ActionResult::Success.as_str(),
        timestamp: &stamp,
        previous_hash: Some(claimed),
    };
    assert!(signer.verify(&fields, &signature));
    // Arbitrary text is never a valid signature unless it is the real one.
    if !claimed.eq_ignore_ascii_case(&signature) {
        assert!(!signer.verify(&fields, claimed));
    }
});
