//! Tests for topic variants and payload transforms.

use super::*;
use crate::subscription::EventSubscription;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::sync::Mutex;

#[test]
fn test_envelope_helpers() {
    let payload = json!({"data": [{"id": "1"}]});
    let record = first_data_record(&payload).unwrap().unwrap();
    assert_eq!(required_str(record, "id").unwrap(), "1");

    // Empty array is not an error; it is a meaningful signal for some topics.
    assert!(first_data_record(&json!({"data": []})).unwrap().is_none());

    assert!(matches!(
        first_data_record(&json!({})),
        Err(PayloadError::MissingField { .. })
    ));
    assert!(matches!(
        first_data_record(&json!({"data": "nope"})),
        Err(PayloadError::InvalidField { .. })
    ));
    assert!(matches!(
        required_str(record, "missing"),
        Err(PayloadError::MissingField { .. })
    ));
}

#[test]
fn test_follow_subscription_ids_are_deterministic() {
    let first = FollowsToUserSubscription::new("42", |_| {});
    let second = FollowsToUserSubscription::new("42", |_| {});
    assert_eq!(first.id(), second.id());
    assert_eq!(first.id().as_str(), "follows.to.42");

    let from = FollowsFromUserSubscription::new("42", |_| {});
    assert_eq!(from.id().as_str(), "follows.from.42");
    // Same user, different topic, different id
    assert_ne!(first.id(), from.id());
}

#[test]
fn test_follow_topics_target_distinct_queries() {
    let to = FollowsToUserSubscription::new("42", |_| {});
    let from = FollowsFromUserSubscription::new("42", |_| {});
    assert_eq!(to.topic().as_str(), "users/follows?first=1&to_id=42");
    assert_eq!(from.topic().as_str(), "users/follows?first=1&from_id=42");
}

#[test]
fn test_follow_delivery_transforms_payload() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let sub = FollowsToUserSubscription::new("42", move |event| {
        sink.lock().unwrap().push(event);
    });

    let payload = json!({
        "data": [{
            "from_id": "7",
            "from_name": "alice",
            "to_id": "42",
            "to_name": "bob",
            "followed_at": "2026-01-15T10:30:00Z"
        }]
    });
    sub.deliver(&payload).unwrap();

    let events = received.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].from_id, "7");
    assert_eq!(events[0].from_name, "alice");
    assert_eq!(events[0].to_id, "42");
    assert_eq!(events[0].to_name, "bob");
}

#[test]
fn test_follow_delivery_rejects_incomplete_payload() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let sub = FollowsToUserSubscription::new("42", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    // Missing `to_name`
    let payload = json!({
        "data": [{
            "from_id": "7",
            "from_name": "alice",
            "to_id": "42",
            "followed_at": "2026-01-15T10:30:00Z"
        }]
    });
    assert!(sub.deliver(&payload).is_err());

    // Empty data array: a follow event always carries a record
    assert!(sub.deliver(&json!({"data": []})).is_err());

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_stream_subscription_live_and_offline() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let sub = StreamChangesSubscription::new("42", move |event| {
        sink.lock().unwrap().push(event);
    });
    assert_eq!(sub.id().as_str(), "stream.changed.42");
    assert_eq!(sub.topic().as_str(), "streams?user_id=42");

    let live = json!({
        "data": [{
            "id": "s-9",
            "user_id": "42",
            "title": "speedrun",
            "viewer_count": 1234,
            "started_at": "2026-01-15T10:30:00Z"
        }]
    });
    sub.deliver(&live).unwrap();
    sub.deliver(&json!({"data": []})).unwrap();

    let events = received.lock().unwrap();
    assert_eq!(events.len(), 2);
    match &events[0] {
        StreamChangeEvent::Live(info) => {
            assert_eq!(info.id, "s-9");
            assert_eq!(info.title, "speedrun");
            assert_eq!(info.viewer_count, 1234);
        }
        other => panic!("expected live event, got {:?}", other),
    }
    assert_eq!(events[1], StreamChangeEvent::Offline);
}

#[test]
fn test_user_subscription_transform() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let sub = UserChangesSubscription::new("42", move |event| {
        sink.lock().unwrap().push(event);
    });
    assert_eq!(sub.id().as_str(), "user.changed.42");

    let payload = json!({
        "data": [{
            "id": "42",
            "login": "bob",
            "display_name": "Bob",
            "description": "streams sometimes"
        }]
    });
    sub.deliver(&payload).unwrap();

    let events = received.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].login, "bob");
    assert_eq!(events[0].display_name, "Bob");

    // Missing record is an error for user changes
    assert!(sub.deliver(&json!({"data": []})).is_err());
}
