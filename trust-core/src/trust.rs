use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A normalised trust score in the range `[0.0, 1.0]`.
///
/// Used for every sub-score, the composite score and action score
/// requirements. Deserialisation rejects out-of-range values.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
#[non_exhaustive]
pub struct TrustScore(f64);

impl TrustScore {
    /// The lowest possible score.
    pub const ZERO: Self = Self(0.0);

    /// The highest possible score.
    pub const ONE: Self = Self(1.0);

    /// Creates a `TrustScore` from a value in `[0.0, 1.0]`.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidTrustScore`] if `value` is outside `[0.0, 1.0]`.
    pub fn new(value: f64) -> Result<Self, CoreError> {
        if value.is_nan() || !(0.0..=1.0).contains(&value) {
            return Err(CoreError::InvalidTrustScore { value });
        }
        Ok(Self(value))
    }

    /// Creates a `TrustScore` by clamping `value` into `[0.0, 1.0]`.
    ///
    /// NaN clamps to `0.0`.
    #[must_use]
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Returns this score raised to at least `floor`.
    #[must_use]
    pub fn at_least(self, floor: Self) -> Self {
        if self.0 < floor.0 {
            floor
        } else {
            self
        }
    }

    /// Returns the score rounded to three decimal places.
    #[must_use]
    pub fn rounded(self) -> f64 {
        (self.0 * 1000.0).round() / 1000.0
    }

    /// Returns the inner `f64` value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for TrustScore {
    fn default() -> Self {
        Self::ZERO
    }
}

impl TryFrom<f64> for TrustScore {
    type Error = CoreError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TrustScore> for f64 {
    fn from(score: TrustScore) -> Self {
        score.0
    }
}

impl fmt::Display for TrustScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}
