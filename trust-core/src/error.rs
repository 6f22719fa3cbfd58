/// Errors produced by the `trust-core` crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CoreError {
    /// A trust score value was outside the valid range `[0.0, 1.0]`.
    #[error("invalid trust score {value}: must be in [0.0, 1.0]")]
    InvalidTrustScore { value: f64 },

    /// A registration or request field failed validation.
    #[error("validation failed for field '{field}': {reason}")]
    Validation { field: String, reason: String },

    /// No tier with the given number exists in the tier table.
    #[error("trust tier {tier} not found")]
    TierNotFound { tier: u32 },

    /// The tier table is not ordered, overlaps, or has out-of-range bounds.
    #[error("invalid tier table: {reason}")]
    InvalidTierTable { reason: String },

    /// Score weights are negative or do not sum to 1.0.
    #[error("invalid score weights: sum is {sum}, must be 1.0")]
    InvalidWeights { sum: f64 },
}

impl CoreError {
    pub(crate) fn validation(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation { field: field.to_owned(), reason: reason.into() }
    }
}
