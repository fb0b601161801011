//! Subscription entity, status, and the shared topic contract.
//!
//! Concrete topic variants (see [`crate::topics`]) implement the
//! [`EventSubscription`] contract; the registry and dispatcher interact with
//! subscriptions only through it. [`ManagedSubscription`] is the registry
//! entry wrapping a variant together with its secret, lease, and status.

use crate::hub::HubTopic;
use crate::secret::SubscriptionSecret;
use crate::{SubscriptionId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    /// Subscribe request sent, awaiting the platform's confirmation challenge.
    Pending,
    /// Confirmed by the platform; currently receiving notifications.
    Verified,
    /// Lease lapsed without a successful renewal.
    Expired,
    /// The most recent subscribe or renew attempt errored.
    Failed,
    /// Explicitly torn down, locally or by platform revocation.
    Removed,
}

impl SubscriptionStatus {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Expired => "expired",
            Self::Failed => "failed",
            Self::Removed => "removed",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error raised when a wire payload cannot be transformed into a typed event.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid field: {field} - {message}")]
    InvalidField { field: String, message: String },
}

// ============================================================================
// Topic contract
// ============================================================================

/// Capability set shared by every topic variant.
///
/// A variant identifies its topic, derives its deterministic id, and knows
/// how to transform a raw notification payload into its typed event and hand
/// it to the caller-supplied handler. Variants never talk to the remote hub
/// themselves; the registry issues subscribe/unsubscribe calls through the
/// injected [`crate::hub::RemoteHub`].
pub trait EventSubscription: Send + Sync {
    /// Deterministic id derived from the topic and its parameters.
    fn id(&self) -> SubscriptionId;

    /// Remote hub topic this subscription targets.
    fn topic(&self) -> HubTopic;

    /// Transform the raw payload and invoke the registered handler with the
    /// typed event. Invoked at most once per accepted delivery.
    fn deliver(&self, payload: &serde_json::Value) -> Result<(), PayloadError>;
}

// ============================================================================
// ManagedSubscription
// ============================================================================

/// Mutable lifecycle state of a registry entry.
///
/// All of it lives behind one lock so a subscription is never observed in two
/// different statuses by two concurrent callers.
struct LifecycleState {
    status: SubscriptionStatus,
    expires_at: Option<Timestamp>,
    failed_renewals: u32,
}

/// A subscription as held by the registry: the topic variant plus its secret,
/// lease length, and lifecycle state.
pub struct ManagedSubscription {
    variant: Box<dyn EventSubscription>,
    secret: SubscriptionSecret,
    lease_seconds: u64,
    state: Mutex<LifecycleState>,
}

impl ManagedSubscription {
    /// Wrap a topic variant, generating a fresh secret.
    pub fn new(variant: Box<dyn EventSubscription>, lease_seconds: u64) -> Self {
        Self {
            variant,
            secret: SubscriptionSecret::generate(),
            lease_seconds,
            state: Mutex::new(LifecycleState {
                status: SubscriptionStatus::Pending,
                expires_at: None,
                failed_renewals: 0,
            }),
        }
    }

    /// Deterministic subscription id.
    pub fn id(&self) -> SubscriptionId {
        self.variant.id()
    }

    /// Remote hub topic.
    pub fn topic(&self) -> HubTopic {
        self.variant.topic()
    }

    /// The per-subscription secret (HMAC key).
    pub fn secret(&self) -> &SubscriptionSecret {
        &self.secret
    }

    /// Requested lease duration in seconds.
    pub fn lease_seconds(&self) -> u64 {
        self.lease_seconds
    }

    /// Current lifecycle status.
    pub fn status(&self) -> SubscriptionStatus {
        self.lock_state().status
    }

    /// Lease deadline, if a subscribe call has been accepted.
    pub fn expires_at(&self) -> Option<Timestamp> {
        self.lock_state().expires_at
    }

    /// Consecutive failed renewal attempts since the last success.
    pub fn failed_renewals(&self) -> u32 {
        self.lock_state().failed_renewals
    }

    /// Transform the payload and invoke the handler.
    pub fn deliver(&self, payload: &serde_json::Value) -> Result<(), PayloadError> {
        self.variant.deliver(payload)
    }

    /// Whether the lease deadline falls inside `now + horizon`.
    ///
    /// Entries that were never accepted by the hub, or that are already
    /// expired or removed, never qualify for renewal.
    pub fn nearing_expiry(&self, horizon: Duration, now: Timestamp) -> bool {
        let state = self.lock_state();
        match (state.status, state.expires_at) {
            (SubscriptionStatus::Expired | SubscriptionStatus::Removed, _) => false,
            (_, Some(expires_at)) => now.add_duration(horizon) >= expires_at,
            (_, None) => false,
        }
    }

    /// Whether the lease deadline itself has passed.
    pub fn past_expiry(&self, now: Timestamp) -> bool {
        matches!(self.lock_state().expires_at, Some(expires_at) if now >= expires_at)
    }

    // ------------------------------------------------------------------------
    // Transitions (crate-internal; driven by the registry and dispatcher)
    // ------------------------------------------------------------------------

    /// A subscribe/renew request is in flight.
    pub(crate) fn begin_subscribe(&self) {
        self.lock_state().status = SubscriptionStatus::Pending;
    }

    /// The hub accepted the subscribe request; the lease clock restarts now.
    /// Confirmation (the challenge round-trip) is still outstanding.
    pub(crate) fn complete_subscribe(&self) {
        let mut state = self.lock_state();
        state.expires_at = Some(Timestamp::now().add_seconds(self.lease_seconds));
    }

    /// The subscribe/renew request errored. Returns the consecutive failure
    /// count for observer reporting.
    pub(crate) fn fail_subscribe(&self) -> u32 {
        let mut state = self.lock_state();
        state.status = SubscriptionStatus::Failed;
        state.failed_renewals += 1;
        state.failed_renewals
    }

    /// The platform confirmed the subscription via the challenge round-trip.
    pub(crate) fn confirm_verified(&self) {
        let mut state = self.lock_state();
        state.status = SubscriptionStatus::Verified;
        state.failed_renewals = 0;
    }

    /// The subscription was torn down, locally or by revocation.
    pub(crate) fn mark_removed(&self) {
        self.lock_state().status = SubscriptionStatus::Removed;
    }

    /// The lease lapsed without a successful renewal.
    pub(crate) fn mark_expired(&self) {
        self.lock_state().status = SubscriptionStatus::Expired;
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, LifecycleState> {
        self.state.lock().expect("subscription state lock poisoned")
    }
}

impl fmt::Debug for ManagedSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("ManagedSubscription")
            .field("id", &self.variant.id())
            .field("status", &state.status)
            .field("expires_at", &state.expires_at)
            .field("lease_seconds", &self.lease_seconds)
            .finish()
    }
}

#[cfg(test)]
#[path = "subscription_tests.rs"]
mod tests;
