//! Shared API key check for every route except `/health`.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use crate::error::GatewayError;
use crate::routes::AppState;

/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Compares keys in constant time.
#[must_use]
pub fn api_key_matches(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// Rejects requests whose `x-api-key` header does not match the configured key.
///
/// # Errors
/// Returns [`GatewayError::Unauthorized`] for a missing, non-UTF-8 or wrong key.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    let provided = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(GatewayError::Unauthorized)?;

    if !api_key_matches(&state.api_key, provided) {
        tracing::warn!(path = %request.uri().path(), "rejected request with bad API key");
        return Err(GatewayError::Unauthorized);
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_keys_compare_equal() {
        assert!(api_key_matches("s3cret", "s3cret"));
    }

    #[test]
    fn different_or_truncated_keys_are_rejected() {
        assert!(!api_key_matches("s3cret", "s3creT"));
        assert!(!api_key_matches("s3cret", "s3cre"));
        assert!(!api_key_matches("s3cret", ""));
    }
}
