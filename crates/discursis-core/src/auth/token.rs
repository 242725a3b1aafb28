//! Client-side reading of the token's `exp` claim.
//!
//! This is informational only. Requests are never gated on it; the server
//! decides whether a token is still valid and answers 401 when it is not.

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Claims {
    /// NumericDate, which may carry a fractional part
    exp: Option<f64>,
}

/// Expiry time encoded in the token payload, if it can be decoded
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() < 3 {
        return None;
    }

    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload))
        .ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.exp.filter(|exp| exp.is_finite())?;
    DateTime::from_timestamp(exp.trunc() as i64, 0)
}

/// Whether the token's `exp` claim is at or before `now`.
/// Tokens that cannot be decoded count as expired.
pub fn is_session_expired(token: &str, now: DateTime<Utc>) -> bool {
    match token_expiry(token) {
        Some(expiry) => now >= expiry,
        None => true,
    }
}
