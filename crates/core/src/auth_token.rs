//! Time-boxed HMAC token verification for the relay handshake.
//!
//! A client proves knowledge of the shared secret by sending
//!
//! ```json
//! { "type": "auth", "timestamp": 1700000000, "token": "<hex>" }
//! ```
//!
//! where `token` is `hex(HMAC-SHA256(secret, decimal(timestamp)))`. The claim
//! is accepted only while `0 <= now - timestamp <= ttl`.

use std::fmt;
use std::sync::Arc;

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::clock::{Clock, SystemClock};
use crate::error::ClaimError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default freshness window for a claim, in seconds.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 300;

/// Value of the `type` field that marks a frame as an authentication claim.
pub const AUTH_MESSAGE_TYPE: &str = "auth";

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// Signing
// ---------------------------------------------------------------------------

fn keyed_mac(secret: &[u8]) -> HmacSha256 {
    HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length")
}

/// Compute the hex token a client must present for `timestamp`.
///
/// `timestamp` is signed exactly as given, so callers should pass the same
/// decimal text they put in the claim.
pub fn sign_timestamp(secret: &[u8], timestamp: &str) -> String {
    let mut mac = keyed_mac(secret);
    mac.update(timestamp.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Verify a raw claim frame using the default TTL.
///
/// Never panics and never errors: anything other than a fresh, correctly
/// signed `auth` claim yields `false`.
pub fn verify(raw: &[u8], secret: &[u8], now_secs: i64) -> bool {
    verify_claim(raw, secret, now_secs, DEFAULT_TOKEN_TTL_SECS).is_ok()
}

/// Verify a raw claim frame, naming the reason on rejection.
pub fn verify_claim(
    raw: &[u8],
    secret: &[u8],
    now_secs: i64,
    ttl_secs: i64,
) -> Result<(), ClaimError> {
    let claim: Value =
        serde_json::from_slice(raw).map_err(|e| ClaimError::Malformed(e.to_string()))?;
    let Value::Object(fields) = claim else {
        return Err(ClaimError::Malformed("expected a JSON object".to_string()));
    };

    if fields.get("type").and_then(Value::as_str) != Some(AUTH_MESSAGE_TYPE) {
        return Err(ClaimError::WrongType);
    }

    let timestamp = fields
        .get("timestamp")
        .ok_or(ClaimError::MissingField("timestamp"))?;
    let (signed_text, issued_at) = timestamp_parts(timestamp)?;

    let age = now_secs as f64 - issued_at;
    if age > ttl_secs as f64 {
        return Err(ClaimError::Expired { age });
    }
    if age < 0.0 {
        return Err(ClaimError::FutureDated { ahead: -age });
    }

    let token = fields
        .get("token")
        .and_then(Value::as_str)
        .ok_or(ClaimError::MissingField("token"))?;
    let provided = hex::decode(token).map_err(|_| ClaimError::InvalidTokenEncoding)?;

    let mut mac = keyed_mac(secret);
    mac.update(signed_text.as_bytes());
    // `verify_slice` compares in constant time and rejects length mismatches.
    mac.verify_slice(&provided)
        .map_err(|_| ClaimError::SignatureMismatch)
}

/// Split a claim timestamp into the text that was signed and its numeric value.
///
/// Strings are signed verbatim; JSON numbers are signed in their canonical
/// decimal form. Non-finite values are rejected.
fn timestamp_parts(value: &Value) -> Result<(String, f64), ClaimError> {
    let (text, numeric) = match value {
        Value::String(s) => {
            let numeric = s
                .trim()
                .parse::<f64>()
                .map_err(|_| ClaimError::InvalidTimestamp)?;
            (s.clone(), numeric)
        }
        Value::Number(n) => {
            let numeric = n.as_f64().ok_or(ClaimError::InvalidTimestamp)?;
            (decimal_text(n, numeric), numeric)
        }
        _ => return Err(ClaimError::InvalidTimestamp),
    };

    if !numeric.is_finite() {
        return Err(ClaimError::InvalidTimestamp);
    }
    Ok((text, numeric))
}

/// Decimal text a client signs for a JSON number.
///
/// Integral values are written without a fraction, so `1.7e9` and
/// `1700000000.0` both sign as `1700000000`.
fn decimal_text(n: &serde_json::Number, numeric: f64) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    if numeric.fract() == 0.0 && numeric.abs() < i64::MAX as f64 {
        return (numeric as i64).to_string();
    }
    numeric.to_string()
}

// ---------------------------------------------------------------------------
// TokenVerifier
// ---------------------------------------------------------------------------

/// Claim verifier bound to a secret, a TTL and a clock.
///
/// Cheap to clone; the secret is shared behind an `Arc`.
#[derive(Clone)]
pub struct TokenVerifier {
    secret: Arc<[u8]>,
    ttl_secs: i64,
    clock: Arc<dyn Clock>,
}

impl TokenVerifier {
    /// Create a verifier using the system clock and [`DEFAULT_TOKEN_TTL_SECS`].
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        let secret: Vec<u8> = secret.into();
        Self {
            secret: secret.into(),
            ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_ttl(mut self, ttl_secs: i64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Check a raw claim frame against the current clock reading.
    pub fn check(&self, raw: &[u8]) -> Result<(), ClaimError> {
        verify_claim(raw, &self.secret, self.clock.now_secs(), self.ttl_secs)
    }

    pub fn verify(&self, raw: &[u8]) -> bool {
        self.check(raw).is_ok()
    }
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("secret", &"<redacted>")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
