//! Background lease renewal.
//!
//! The scheduler periodically scans the registry for subscriptions whose
//! lease deadline falls inside the renewal horizon and re-issues the
//! subscribe call for each; the platform treats re-subscription to the same
//! topic as a lease refresh. A failed renewal is retried on every following
//! tick until the actual lease deadline passes, at which point the entry is
//! marked expired and reported — a single missed tick never drops a
//! subscription early.

use crate::registry::SubscriptionRegistry;
use crate::subscription::SubscriptionStatus;
use crate::Timestamp;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Timing configuration for the renewal scheduler.
///
/// The tick interval must be much shorter than the smallest granted lease;
/// leases are measured in tens of thousands of seconds, ticks in tens.
#[derive(Debug, Clone)]
pub struct RenewalConfig {
    /// How often the registry is scanned.
    pub interval: Duration,
    /// How far ahead of the lease deadline renewal starts.
    pub horizon: Duration,
}

impl Default for RenewalConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            horizon: Duration::from_secs(900),
        }
    }
}

/// Handle to a running scheduler task.
pub struct RenewalHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RenewalHandle {
    /// Stop the scheduler and wait for the task to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Renewal scheduler task ended abnormally");
        }
    }
}

/// Periodic background process that keeps leases alive.
pub struct RenewalScheduler;

impl RenewalScheduler {
    /// Spawn the scheduler over the shared registry.
    pub fn spawn(registry: Arc<SubscriptionRegistry>, config: RenewalConfig) -> RenewalHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!(
                interval_secs = config.interval.as_secs(),
                horizon_secs = config.horizon.as_secs(),
                "Renewal scheduler started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_tick(&registry, config.horizon).await;
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("Renewal scheduler stopping");
                            break;
                        }
                    }
                }
            }
        });

        RenewalHandle {
            shutdown: shutdown_tx,
            task,
        }
    }
}

/// One scan over the registry.
///
/// Exactly one subscribe call is issued per nearing-expiry entry per tick.
/// An entry that is still failed once its actual deadline has passed
/// transitions to expired instead of being renewed again; entries whose
/// renewal merely failed inside the horizon stay registered for the next
/// tick. One entry's failure never aborts the scan.
async fn run_tick(registry: &Arc<SubscriptionRegistry>, horizon: Duration) {
    let due = registry.list_nearing_expiry(horizon);
    if due.is_empty() {
        return;
    }
    debug!(count = due.len(), "Renewal tick");

    let now = Timestamp::now();
    for entry in due {
        if entry.past_expiry(now) && entry.status() == SubscriptionStatus::Failed {
            registry.expire(&entry).await;
            continue;
        }

        if let Err(e) = registry.renew(&entry).await {
            warn!(
                id = %entry.id(),
                error = %e,
                "Renewal attempt failed; will retry next tick"
            );
        }
    }
}

#[cfg(test)]
#[path = "renewal_tests.rs"]
mod tests;
