//! Webhook signature verification.
//!
//! Sentry signs each webhook body with HMAC-SHA256 keyed by the integration's
//! client secret and sends the lowercase hex digest in `Sentry-Hook-Signature`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Result of checking a request against the configured secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Signature matches the body.
    Verified,
    /// No secret configured; the request is trusted as-is.
    Skipped,
    /// A secret is configured but the request carried no signature.
    MissingSignature,
    /// The signature does not match the body.
    Mismatch,
}

impl Verification {
    /// Whether the request may proceed.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Verified | Self::Skipped)
    }
}

/// Compute the hex-encoded HMAC-SHA256 of `body` keyed with `secret`.
#[must_use]
pub fn compute_signature(body: &[u8], secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a webhook signature using HMAC-SHA256.
///
/// # Arguments
/// * `body` - Raw webhook body bytes
/// * `signature` - Hex-encoded signature from `Sentry-Hook-Signature` header
/// * `secret` - Sentry client secret
///
/// # Returns
/// `true` if the signature equals the computed digest, `false` otherwise
#[must_use]
pub fn verify_webhook_signature(body: &[u8], signature: &str, secret: &str) -> bool {
    let Some(computed) = compute_signature(body, secret) else {
        return false;
    };

    // Constant-time comparison to prevent timing attacks
    computed.as_bytes().ct_eq(signature.as_bytes()).into()
}

/// Check a request against an optional secret.
#[must_use]
pub fn verify_request(body: &[u8], signature: Option<&str>, secret: Option<&str>) -> Verification {
    let Some(secret) = secret else {
        return Verification::Skipped;
    };
    let Some(signature) = signature else {
        return Verification::MissingSignature;
    };

    if verify_webhook_signature(body, signature, secret) {
        Verification::Verified
    } else {
        Verification::Mismatch
    }
}
