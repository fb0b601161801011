//! Lifecycle event reporting hook.
//!
//! Revocations, expiries, and renewal failures are detected asynchronously —
//! through inbound deliveries or background checks — so the owning
//! application learns about them through an injected observer rather than a
//! return value.

use crate::SubscriptionId;
use async_trait::async_trait;

/// A lifecycle transition worth reporting to the owning application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The platform confirmed the subscription via the challenge round-trip.
    Verified { id: SubscriptionId },
    /// The platform unilaterally ended the subscription.
    Revoked { id: SubscriptionId },
    /// The lease lapsed without a successful renewal.
    Expired { id: SubscriptionId },
    /// A renewal attempt failed; it will be retried on the next tick until
    /// the actual lease deadline.
    RenewalFailed { id: SubscriptionId, attempts: u32 },
}

/// Observer interface for lifecycle events.
#[async_trait]
pub trait LifecycleObserver: Send + Sync {
    /// Called for every reported lifecycle transition.
    async fn notify(&self, event: LifecycleEvent);
}

/// Observer that discards all events.
#[derive(Debug, Default)]
pub struct NoopObserver;

#[async_trait]
impl LifecycleObserver for NoopObserver {
    async fn notify(&self, _event: LifecycleEvent) {}
}
