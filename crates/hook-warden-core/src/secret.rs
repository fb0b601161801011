//! Per-subscription secret generation and handling.
//!
//! Every subscription owns a random secret that is transmitted exactly once:
//! to the remote platform inside the subscribe request. From then on it only
//! serves as the HMAC key for verifying inbound deliveries. The secret never
//! appears on any interface, in `Debug` output, or in logs.

use rand::{distr::Alphanumeric, Rng as _};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secure container for a per-subscription secret.
///
/// The backing memory is zeroized when the value is dropped, and the value is
/// redacted from `Debug` output.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SubscriptionSecret {
    inner: String,
}

impl SubscriptionSecret {
    /// Number of characters in a generated secret.
    pub const LENGTH: usize = 32;

    /// Generate a fresh random secret.
    pub fn generate() -> Self {
        let inner: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(Self::LENGTH)
            .map(char::from)
            .collect();
        Self { inner }
    }

    /// Wrap an existing secret value.
    ///
    /// Intended for tests and fixtures; production subscriptions should use
    /// [`SubscriptionSecret::generate`].
    pub fn from_value(value: impl Into<String>) -> Self {
        Self {
            inner: value.into(),
        }
    }

    /// Get the secret as a string slice (only for immediate use).
    ///
    /// # Security Warning
    /// The returned slice contains the actual secret value. Use it for HMAC
    /// keying or the hub subscribe call and do not store it elsewhere.
    pub fn expose_secret(&self) -> &str {
        &self.inner
    }

    /// Get secret length without exposing content
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if the secret is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl std::fmt::Debug for SubscriptionSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionSecret")
            .field("inner", &"<REDACTED>")
            .finish()
    }
}

#[cfg(test)]
#[path = "secret_tests.rs"]
mod tests;
