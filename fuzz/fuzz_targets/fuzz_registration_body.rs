//! Fuzz target: registration JSON parsing, validation and identity scoring.
//!
//! Arbitrary bytes must never panic the parser or validator, and any accepted
//! registration must score inside `[0, 1]`.

#![no_main]

use chrono::Utc;
use libfuzzer_sys::fuzz_target;
use trust_core::scoring::identity_score;
use trust_core::{Agent, AgentId, Registration};

fuzz_target!(|data: &[u8]| {
    let Ok(registration) = serde_json::from_slice::<Registration>(data) else {
        return;
    };
    let Ok(registration) = registration.validate() else {
        return;
    };
    let agent = Agent::new(AgentId::new(), registration, Utc::now());
    let (score, _) = identity_score(&agent);
    assert!((0.0..=1.0).contains(&score.value()), "identity score out of range");
});
