//! Logging [`LifecycleObserver`] for the service binary.
//!
//! The service has no richer reporting surface than its structured logs, so
//! lifecycle events are logged at a severity matching how actionable they
//! are: confirmations at INFO, everything the operator may need to act on at
//! WARN.

use async_trait::async_trait;
use hook_warden_core::{LifecycleEvent, LifecycleObserver};
use tracing::{info, warn};

/// Observer that reports lifecycle events through `tracing`.
#[derive(Debug, Default)]
pub struct LogLifecycleObserver;

#[async_trait]
impl LifecycleObserver for LogLifecycleObserver {
    async fn notify(&self, event: LifecycleEvent) {
        match event {
            LifecycleEvent::Verified { id } => {
                info!(%id, "Subscription verified");
            }
            LifecycleEvent::Revoked { id } => {
                warn!(%id, "Subscription revoked by the platform");
            }
            LifecycleEvent::Expired { id } => {
                warn!(%id, "Subscription lease expired; it will not be renewed");
            }
            LifecycleEvent::RenewalFailed { id, attempts } => {
                warn!(%id, attempts, "Subscription renewal failed; retrying next tick");
            }
        }
    }
}

#[cfg(test)]
#[path = "observer_tests.rs"]
mod tests;
