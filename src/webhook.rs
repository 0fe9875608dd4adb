//! HMAC-SHA256 signatures for inbound and outbound webhooks
//!
//! The signed message is `v1:{timestamp}:{body}` and the signature header
//! value is `v1=<hex>`. Verification rejects timestamps outside the
//! tolerance window before comparing, and compares in constant time.

use crate::digest::{hex_decode, hex_encode};
use crate::error::{ComplianceError, Result};
use ring::hmac;

/// Signature scheme version prefix
pub const SIGNATURE_VERSION: &str = "v1";

/// Maximum accepted clock distance between signer and verifier, in seconds
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

fn signed_message(timestamp: i64, body: &[u8]) -> Vec<u8> {
    let mut message = format!("{}:{}:", SIGNATURE_VERSION, timestamp).into_bytes();
    message.extend_from_slice(body);
    message
}

/// Sign `body` sent at `timestamp` (unix seconds)
pub fn sign(secret: &[u8], timestamp: i64, body: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    let tag = hmac::sign(&key, &signed_message(timestamp, body));
    format!("{}={}", SIGNATURE_VERSION, hex_encode(tag.as_ref()))
}

/// Verify a `v1=<hex>` signature.
///
/// `now` and `timestamp` are unix seconds. Errors never include the body
/// or the expected signature.
pub fn verify(
    secret: &[u8],
    timestamp: i64,
    body: &[u8],
    signature: &str,
    now: i64,
    tolerance_secs: i64,
) -> Result<()> {
    if now.abs_diff(timestamp) > tolerance_secs.unsigned_abs() {
        return Err(ComplianceError::Validation(format!(
            "webhook timestamp outside the {}s tolerance window",
            tolerance_secs
        )));
    }

    let tag = signature
        .strip_prefix(SIGNATURE_VERSION)
        .and_then(|rest| rest.strip_prefix('='))
        .and_then(hex_decode)
        .ok_or_else(|| {
            ComplianceError::Validation(format!(
                "webhook signature must have the form '{}=<hex>'",
                SIGNATURE_VERSION
            ))
        })?;

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    hmac::verify(&key, &signed_message(timestamp, body), &tag)
        .map_err(|_| ComplianceError::Validation("webhook signature mismatch".to_string()))
}
