//! Trust tiers and the score-to-tier resolver.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Wire sentinel meaning "every action".
pub const WILDCARD: &str = "*";

/// Actions a tier permits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum Permissions {
    /// Every action, serialised as `["*"]`.
    All,
    /// An explicit allow-list.
    Actions(Vec<String>),
}

impl Permissions {
    /// Flattened list form; the wildcard collapses to `["*"]`.
    #[must_use]
    pub fn to_list(&self) -> Vec<String> {
        match self {
            Self::All => vec![WILDCARD.to_owned()],
            Self::Actions(actions) => actions.clone(),
        }
    }
}

impl From<Vec<String>> for Permissions {
    fn from(actions: Vec<String>) -> Self {
        if actions.iter().any(|a| a == WILDCARD) {
            Self::All
        } else {
            Self::Actions(actions)
        }
    }
}

impl From<Permissions> for Vec<String> {
    fn from(permissions: Permissions) -> Self {
        match permissions {
            Permissions::All => vec![WILDCARD.to_owned()],
            Permissions::Actions(actions) => actions,
        }
    }
}

/// One row of the tier table.
///
/// `min_score` is inclusive and `max_score` exclusive, except for the top
/// tier whose range includes `1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustTier {
    pub tier: u32,
    pub name: String,
    pub min_score: f64,
    pub max_score: f64,
    pub description: String,
    pub permissions: Permissions,
}

/// Resolves a composite score to a tier number.
///
/// Scans tiers from the highest number down and returns the first whose
/// `min_score` is at or below `score`; `0` if none match. Assumes the table
/// is well ordered, see [`validate_tier_table`].
#[must_use]
pub fn determine_tier(score: f64, tiers: &[TrustTier]) -> u32 {
    let mut ordered: Vec<&TrustTier> = tiers.iter().collect();
    ordered.sort_by(|a, b| b.tier.cmp(&a.tier));
    ordered.into_iter().find(|t| score >= t.min_score).map_or(0, |t| t.tier)
}

/// Looks up a tier by number.
#[must_use]
pub fn find_tier(tier: u32, tiers: &[TrustTier]) -> Option<&TrustTier> {
    tiers.iter().find(|t| t.tier == tier)
}

/// Permitted actions for `tier`, or an empty list if the tier is unknown.
#[must_use]
pub fn permitted_actions(tier: u32, tiers: &[TrustTier]) -> Vec<String> {
    find_tier(tier, tiers).map(|t| t.permissions.to_list()).unwrap_or_default()
}

/// Checks that a tier table is ascending by tier number and by score range,
/// with non-overlapping ranges inside `[0, 1]`.
///
/// # Errors
/// Returns [`CoreError::InvalidTierTable`] describing the first violation.
pub fn validate_tier_table(tiers: &[TrustTier]) -> Result<(), CoreError> {
    if tiers.is_empty() {
        return Err(CoreError::InvalidTierTable { reason: "table is empty".to_owned() });
    }

    let mut ordered: Vec<&TrustTier> = tiers.iter().collect();
    ordered.sort_by_key(|t| t.tier);

    for tier in &ordered {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if !in_range(tier.min_score) || !in_range(tier.max_score) {
            return Err(CoreError::InvalidTierTable {
                reason: format!("tier {} has bounds outside [0, 1]", tier.tier),
            });
        }
        if tier.min_score >= tier.max_score {
            return Err(CoreError::InvalidTierTable {
                reason: format!(
                    "tier {} min_score {} must be below max_score {}",
                    tier.tier, tier.min_score, tier.max_score
                ),
            });
        }
    }

    for pair in ordered.windows(2) {
        let (lower, upper) = (pair[0], pair[1]);
        if lower.tier == upper.tier {
            return Err(CoreError::InvalidTierTable {
                reason: format!("tier {} appears more than once", lower.tier),
            });
        }
        if upper.min_score < lower.max_score {
            return Err(CoreError::InvalidTierTable {
                reason: format!(
                    "tier {} starts at {} inside tier {} which ends at {}",
                    upper.tier, upper.min_score, lower.tier, lower.max_score
                ),
            });
        }
    }

    Ok(())
}
