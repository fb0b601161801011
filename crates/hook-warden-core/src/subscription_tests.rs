//! Tests for subscription lifecycle state.

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct TestSubscription {
    delivered: Arc<AtomicUsize>,
}

impl EventSubscription for TestSubscription {
    fn id(&self) -> SubscriptionId {
        SubscriptionId::from_parts(&["test", "topic", "1"])
    }

    fn topic(&self) -> HubTopic {
        HubTopic::new("test/topic?id=1")
    }

    fn deliver(&self, _payload: &serde_json::Value) -> Result<(), PayloadError> {
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn managed(lease_seconds: u64) -> (ManagedSubscription, Arc<AtomicUsize>) {
    let delivered = Arc::new(AtomicUsize::new(0));
    let variant = TestSubscription {
        delivered: Arc::clone(&delivered),
    };
    (
        ManagedSubscription::new(Box::new(variant), lease_seconds),
        delivered,
    )
}

#[test]
fn test_new_subscription_is_pending_without_lease() {
    let (sub, _) = managed(100);
    assert_eq!(sub.status(), SubscriptionStatus::Pending);
    assert_eq!(sub.expires_at(), None);
    assert_eq!(sub.failed_renewals(), 0);
    assert_eq!(sub.lease_seconds(), 100);
}

#[test]
fn test_complete_subscribe_sets_lease_deadline() {
    let (sub, _) = managed(3600);
    sub.begin_subscribe();
    sub.complete_subscribe();

    let expires_at = sub.expires_at().expect("deadline should be set");
    let now = Timestamp::now();
    assert!(expires_at > now);
    assert!(expires_at <= now.add_seconds(3600));
}

#[test]
fn test_failure_and_recovery_counting() {
    let (sub, _) = managed(100);
    assert_eq!(sub.fail_subscribe(), 1);
    assert_eq!(sub.status(), SubscriptionStatus::Failed);
    assert_eq!(sub.fail_subscribe(), 2);

    sub.confirm_verified();
    assert_eq!(sub.status(), SubscriptionStatus::Verified);
    assert_eq!(sub.failed_renewals(), 0);
}

#[test]
fn test_nearing_expiry_horizon_math() {
    let (sub, _) = managed(60);
    sub.complete_subscribe();
    let now = Timestamp::now();

    // Deadline 60s out: inside a 2-minute horizon, outside a 10s horizon.
    assert!(sub.nearing_expiry(Duration::from_secs(120), now));
    assert!(!sub.nearing_expiry(Duration::from_secs(10), now));
}

#[test]
fn test_terminal_statuses_never_qualify_for_renewal() {
    let (sub, _) = managed(0);
    sub.complete_subscribe();
    let now = Timestamp::now();
    assert!(sub.nearing_expiry(Duration::from_secs(60), now));

    sub.mark_expired();
    assert!(!sub.nearing_expiry(Duration::from_secs(60), now));

    sub.mark_removed();
    assert!(!sub.nearing_expiry(Duration::from_secs(60), now));
}

#[test]
fn test_never_subscribed_entry_not_listed_for_renewal() {
    let (sub, _) = managed(100);
    assert!(!sub.nearing_expiry(Duration::from_secs(3600), Timestamp::now()));
    assert!(!sub.past_expiry(Timestamp::now()));
}

#[test]
fn test_past_expiry_with_zero_lease() {
    let (sub, _) = managed(0);
    sub.complete_subscribe();
    assert!(sub.past_expiry(Timestamp::now()));
}

#[test]
fn test_deliver_delegates_to_variant() {
    let (sub, delivered) = managed(100);
    sub.deliver(&serde_json::json!({"data": []})).unwrap();
    assert_eq!(delivered.load(Ordering::SeqCst), 1);
}

#[test]
fn test_debug_output_excludes_secret() {
    let (sub, _) = managed(100);
    let debug = format!("{:?}", sub);
    assert!(debug.contains("test.topic.1"));
    assert!(!debug.contains(sub.secret().expose_secret()));
}
