//! HMAC-SHA256 signature computation and verification for inbound deliveries.
//!
//! The platform signs every delivery with the per-subscription secret over
//! the concatenation of message id, message timestamp, and raw body. Including
//! the timestamp means a captured body cannot be replayed under a different
//! message id without invalidating the signature.
//!
//! Verification fails closed: a missing, truncated, or non-hex signature is a
//! verification failure, never a reason to skip verification.

use crate::secret::SubscriptionSecret;
use crate::MessageId;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Prefix carried by the signature header, GitHub-style.
const SIGNATURE_PREFIX: &str = "sha256=";

/// Compute the expected signature for a delivery.
///
/// Returns `sha256=<lowercase hex digest>` over
/// `message_id + timestamp + body`, keyed with the subscription secret.
/// Used by the platform when signing and by tests when building fixtures.
pub fn compute_signature(
    secret: &SubscriptionSecret,
    message_id: &MessageId,
    timestamp: &str,
    body: &[u8],
) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes())
        .expect("HMAC-SHA256 accepts keys of any length");
    mac.update(message_id.as_str().as_bytes());
    mac.update(timestamp.as_bytes());
    mac.update(body);

    format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes()))
}

/// Verify the signature presented by an inbound delivery.
///
/// Accepts signatures in `sha256=<hex>` format; a bare hex digest is
/// tolerated. The comparison runs in constant time so response timing leaks
/// nothing about the secret. Returns `false` for any malformed input.
pub fn verify_signature(
    secret: &SubscriptionSecret,
    message_id: &MessageId,
    timestamp: &str,
    body: &[u8],
    provided: &str,
) -> bool {
    let provided_hex = provided
        .strip_prefix(SIGNATURE_PREFIX)
        .unwrap_or(provided)
        .to_ascii_lowercase();

    // Reject values that cannot be a SHA-256 digest before comparing; the
    // length check is not secret-dependent.
    if !matches!(hex::decode(&provided_hex), Ok(digest) if digest.len() == 32) {
        return false;
    }

    let expected = compute_signature(secret, message_id, timestamp, body);
    let expected_hex = &expected[SIGNATURE_PREFIX.len()..];

    expected_hex
        .as_bytes()
        .ct_eq(provided_hex.as_bytes())
        .into()
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
