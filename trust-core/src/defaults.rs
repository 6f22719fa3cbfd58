//! Default tier table and action policy.
//!
//! Four tiers partition `[0, 1]`: `Untrusted` < 0.2 <= `Limited` < 0.5 <=
//! `Trusted` < 0.8 <= `Privileged`.

use crate::authz::{ActionPolicy, Requirement};
use crate::tier::{Permissions, TrustTier};

fn actions(list: &[&str]) -> Permissions {
    Permissions::Actions(list.iter().map(|a| (*a).to_owned()).collect())
}

/// Returns the default four-tier table, ascending by tier number.
#[must_use]
pub fn default_tiers() -> Vec<TrustTier> {
    vec![
        TrustTier {
            tier: 0,
            name: "Untrusted".to_owned(),
            min_score: 0.0,
            max_score: 0.2,
            description: "Read-only access, no external actions".to_owned(),
            permissions: actions(&["read_config", "view_status"]),
        },
        TrustTier {
            tier: 1,
            name: "Limited".to_owned(),
            min_score: 0.2,
            max_score: 0.5,
            description: "Basic actions, rate-limited".to_owned(),
            permissions: actions(&["read_config", "view_status", "send_notification", "read_data"]),
        },
        TrustTier {
            tier: 2,
            name: "Trusted".to_owned(),
            min_score: 0.5,
            max_score: 0.8,
            description: "Most actions with some restrictions".to_owned(),
            permissions: actions(&[
                "read_config",
                "view_status",
                "send_notification",
                "read_data",
                "write_data",
                "call_api",
                "send_email",
            ]),
        },
        TrustTier {
            tier: 3,
            name: "Privileged".to_owned(),
            min_score: 0.8,
            max_score: 1.0,
            description: "Full access, self-approval".to_owned(),
            permissions: Permissions::All,
        },
    ]
}

/// Returns the default action requirement table.
///
/// Unknown actions require tier 1 and score 0.3.
#[must_use]
pub fn default_action_policy() -> ActionPolicy {
    let entries = [
        ("read_config", Requirement::new(0, 0.0)),
        ("view_status", Requirement::new(0, 0.0)),
        ("send_notification", Requirement::new(1, 0.2)),
        ("read_data", Requirement::new(1, 0.2)),
        ("write_data", Requirement::new(2, 0.5)),
        ("call_api", Requirement::new(2, 0.5)),
        ("send_email", Requirement::new(2, 0.5)),
        ("delete_data", Requirement::new(3, 0.8)),
        ("delete_database", Requirement::new(3, 0.9)),
        ("admin_action", Requirement::new(3, 0.85)),
    ];
    ActionPolicy::new(
        entries.into_iter().map(|(action, req)| (action.to_owned(), req)),
        Requirement::new(1, 0.3),
    )
}
