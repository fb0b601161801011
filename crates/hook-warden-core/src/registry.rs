//! In-memory table of active subscriptions.
//!
//! The registry owns every [`ManagedSubscription`], keyed by its
//! deterministic id. It is the only mutable structure shared between the
//! dispatcher and the renewal scheduler; the id-keyed map sits behind one
//! `RwLock` and is never held across an await, so inserts, removals, and
//! lookups are atomic with respect to concurrent readers.

use crate::hub::{HubRequest, RemoteHub};
use crate::observer::{LifecycleEvent, LifecycleObserver};
use crate::subscription::{EventSubscription, ManagedSubscription};
use crate::{HubError, SubscriptionId, Timestamp};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use url::Url;

// ============================================================================
// CallbackSettings
// ============================================================================

/// Settings for building per-subscription callback URLs.
#[derive(Debug, Clone)]
pub struct CallbackSettings {
    external_url: String,
    default_lease_seconds: u64,
}

impl CallbackSettings {
    /// Lease requested when a subscription does not specify one.
    pub const DEFAULT_LEASE_SECONDS: u64 = 100_000;

    /// Create callback settings.
    ///
    /// `external_url` is the public base URL the listener is reachable under,
    /// including any mount prefix (e.g. `https://bot.example.com/hooks`).
    pub fn new(external_url: Url) -> Self {
        Self {
            external_url: external_url.as_str().trim_end_matches('/').to_string(),
            default_lease_seconds: Self::DEFAULT_LEASE_SECONDS,
        }
    }

    /// Override the default lease duration.
    pub fn with_default_lease_seconds(mut self, lease_seconds: u64) -> Self {
        self.default_lease_seconds = lease_seconds;
        self
    }

    /// Default lease duration in seconds.
    pub fn default_lease_seconds(&self) -> u64 {
        self.default_lease_seconds
    }

    /// Callback URL the platform should deliver to for `id`.
    pub fn callback_url(&self, id: &SubscriptionId) -> String {
        format!("{}/event/{}", self.external_url, id)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// Error raised by registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A subscription with the same deterministic id already exists. Remote
    /// re-subscription under a colliding id is almost certainly a caller bug,
    /// so it is rejected rather than merged.
    #[error("Subscription '{id}' already exists")]
    Duplicate { id: SubscriptionId },

    /// The initial subscribe call against the platform failed.
    #[error("Subscribe request failed: {0}")]
    Subscribe(#[from] HubError),
}

// ============================================================================
// SubscriptionRegistry
// ============================================================================

/// Table of active subscriptions plus the collaborators needed to manage
/// their remote leases.
pub struct SubscriptionRegistry {
    hub: Arc<dyn RemoteHub>,
    callbacks: CallbackSettings,
    observer: Arc<dyn LifecycleObserver>,
    ready: AtomicBool,
    entries: RwLock<HashMap<SubscriptionId, Arc<ManagedSubscription>>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    ///
    /// The registry starts in the not-ready state: subscriptions created
    /// before [`SubscriptionRegistry::mark_ready`] are parked locally and
    /// only subscribed against the platform once the hosting application
    /// signals that the listening endpoint is accepting requests. Subscribing
    /// earlier would lose the confirmation challenge the platform sends
    /// immediately after the subscribe call.
    pub fn new(
        hub: Arc<dyn RemoteHub>,
        callbacks: CallbackSettings,
        observer: Arc<dyn LifecycleObserver>,
    ) -> Self {
        Self {
            hub,
            callbacks,
            observer,
            ready: AtomicBool::new(false),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a topic variant with the default lease.
    ///
    /// Stores the subscription and, when the registry is ready, issues the
    /// remote subscribe call before returning — so a platform rejection of
    /// the initial subscribe surfaces synchronously to the caller, and the
    /// failed entry is rolled back. Confirmation (the challenge round-trip)
    /// always arrives asynchronously through the dispatcher.
    pub async fn create(
        &self,
        variant: Box<dyn EventSubscription>,
    ) -> Result<Arc<ManagedSubscription>, RegistryError> {
        let lease = self.callbacks.default_lease_seconds();
        self.create_with_lease(variant, lease).await
    }

    /// Register a topic variant with an explicit lease duration.
    #[instrument(skip(self, variant), fields(id = %variant.id()))]
    pub async fn create_with_lease(
        &self,
        variant: Box<dyn EventSubscription>,
        lease_seconds: u64,
    ) -> Result<Arc<ManagedSubscription>, RegistryError> {
        let id = variant.id();
        let entry = Arc::new(ManagedSubscription::new(variant, lease_seconds));

        {
            let mut entries = self.lock_write();
            if entries.contains_key(&id) {
                return Err(RegistryError::Duplicate { id });
            }
            entries.insert(id.clone(), Arc::clone(&entry));
        }

        if self.ready.load(Ordering::SeqCst) {
            if let Err(e) = self.issue_subscribe(&entry).await {
                // Roll back so a later create with the same parameters is not
                // rejected as a duplicate of a subscription that never was.
                self.lock_write().remove(&id);
                return Err(e.into());
            }
        } else {
            info!(%id, "Listener not ready; subscription parked until mark_ready");
        }

        info!(%id, lease_seconds, "Subscription created");
        Ok(entry)
    }

    /// Signal that the listening endpoint is accepting requests, and issue
    /// the subscribe call for every parked subscription.
    ///
    /// Failures here are logged and reported per entry rather than
    /// propagated; the renewal scheduler retries them like any other failed
    /// lease.
    pub async fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);

        let parked: Vec<_> = self
            .lock_read()
            .values()
            .filter(|entry| entry.expires_at().is_none())
            .cloned()
            .collect();

        for entry in parked {
            if let Err(e) = self.issue_subscribe(&entry).await {
                error!(
                    id = %entry.id(),
                    error = %e,
                    "Failed to subscribe parked subscription"
                );
            }
        }

        info!("Listener marked ready");
    }

    /// Look up a subscription by id.
    pub fn resolve(&self, id: &SubscriptionId) -> Option<Arc<ManagedSubscription>> {
        self.lock_read().get(id).cloned()
    }

    /// Remove a subscription: cancel the remote lease, then delete the entry.
    ///
    /// Removing an id that does not exist is a no-op. The remote cancel is
    /// idempotent, but a transport failure reaching the platform keeps the
    /// entry in place and is surfaced to the caller.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &SubscriptionId) -> Result<(), HubError> {
        let Some(entry) = self.resolve(id) else {
            return Ok(());
        };

        self.hub.unsubscribe(&self.hub_request(&entry)).await?;

        entry.mark_removed();
        self.lock_write().remove(id);
        info!(%id, "Subscription removed");
        Ok(())
    }

    /// Drop a subscription the platform has already ended (revocation).
    ///
    /// No remote call is made; the platform initiated the teardown.
    pub(crate) async fn discard_revoked(&self, id: &SubscriptionId) {
        let removed = self.lock_write().remove(id);
        if let Some(entry) = removed {
            entry.mark_removed();
            warn!(%id, "Subscription revoked by the platform");
            self.observer
                .notify(LifecycleEvent::Revoked { id: id.clone() })
                .await;
        }
    }

    /// Record that the platform confirmed a subscription.
    pub(crate) async fn confirm_verified(&self, entry: &ManagedSubscription) {
        entry.confirm_verified();
        let id = entry.id();
        info!(%id, "Subscription verified by the platform");
        self.observer.notify(LifecycleEvent::Verified { id }).await;
    }

    /// Subscriptions whose lease deadline falls within `now + horizon`.
    pub fn list_nearing_expiry(&self, horizon: Duration) -> Vec<Arc<ManagedSubscription>> {
        let now = Timestamp::now();
        self.lock_read()
            .values()
            .filter(|entry| entry.nearing_expiry(horizon, now))
            .cloned()
            .collect()
    }

    /// Re-issue the subscribe call for an existing entry; the platform treats
    /// re-subscription to the same topic as a lease refresh.
    ///
    /// On failure the entry is marked failed, the observer is told, and the
    /// error is returned; the entry stays registered so the next scheduler
    /// tick can retry until the actual lease deadline.
    pub async fn renew(&self, entry: &Arc<ManagedSubscription>) -> Result<(), HubError> {
        match self.issue_subscribe(entry).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let attempts = entry.failed_renewals();
                self.observer
                    .notify(LifecycleEvent::RenewalFailed {
                        id: entry.id(),
                        attempts,
                    })
                    .await;
                Err(e)
            }
        }
    }

    /// Mark an entry expired and report it. The entry stays in the table so
    /// the owning application can observe the terminal state; it no longer
    /// qualifies for renewal.
    pub(crate) async fn expire(&self, entry: &Arc<ManagedSubscription>) {
        entry.mark_expired();
        let id = entry.id();
        warn!(%id, "Subscription lease expired without successful renewal");
        self.observer.notify(LifecycleEvent::Expired { id }).await;
    }

    /// Cancel every remote lease and clear the table (shutdown path).
    ///
    /// Remote failures are logged and do not stop the teardown.
    pub async fn dispose_all(&self) {
        let drained: Vec<_> = self.lock_write().drain().collect();
        for (id, entry) in drained {
            if let Err(e) = self.hub.unsubscribe(&self.hub_request(&entry)).await {
                error!(%id, error = %e, "Failed to cancel remote lease during shutdown");
            }
            entry.mark_removed();
        }
        info!("All subscriptions disposed");
    }

    /// Number of registered subscriptions.
    pub fn len(&self) -> usize {
        self.lock_read().len()
    }

    /// Check whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------------
    // Private helpers
    // ------------------------------------------------------------------------

    async fn issue_subscribe(&self, entry: &Arc<ManagedSubscription>) -> Result<(), HubError> {
        entry.begin_subscribe();
        let request = self.hub_request(entry);

        match self.hub.subscribe(&request, entry.secret()).await {
            Ok(()) => {
                entry.complete_subscribe();
                Ok(())
            }
            Err(e) => {
                let attempts = entry.fail_subscribe();
                warn!(
                    id = %entry.id(),
                    attempts,
                    error = %e,
                    "Subscribe request failed"
                );
                Err(e)
            }
        }
    }

    fn hub_request(&self, entry: &ManagedSubscription) -> HubRequest {
        HubRequest {
            topic: entry.topic(),
            callback_url: self.callbacks.callback_url(&entry.id()),
            lease_seconds: entry.lease_seconds(),
        }
    }

    fn lock_read(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<SubscriptionId, Arc<ManagedSubscription>>> {
        self.entries.read().expect("registry lock poisoned")
    }

    fn lock_write(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<SubscriptionId, Arc<ManagedSubscription>>> {
        self.entries.write().expect("registry lock poisoned")
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
