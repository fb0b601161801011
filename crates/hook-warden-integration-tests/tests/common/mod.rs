//! Common test utilities for hook-warden integration tests
//!
//! This module provides:
//! - A recording [`RemoteHub`] double and a recording lifecycle observer
//! - A fully wired listener fixture (router + registry + dispatcher)
//! - Helpers for building signed platform requests

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::Router;
use hook_warden_api::{create_router, AppState, ServiceConfig};
use hook_warden_core::{
    compute_signature, Dispatcher, FollowsToUserSubscription, HubError, HubRequest,
    LifecycleEvent, LifecycleObserver, MessageDeduplicator, MessageId, RemoteHub,
    SubscriptionId, SubscriptionRegistry, SubscriptionSecret,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Timestamp used for every signed test request.
#[allow(dead_code)]
pub const TIMESTAMP: &str = "2026-01-15T10:30:00Z";

// ============================================================================
// Recording hub
// ============================================================================

/// [`RemoteHub`] double that records every request and always succeeds.
#[derive(Default)]
pub struct RecordingHub {
    pub subscribes: Mutex<Vec<HubRequest>>,
    pub unsubscribes: Mutex<Vec<HubRequest>>,
}

impl RecordingHub {
    #[allow(dead_code)]
    pub fn subscribe_count(&self) -> usize {
        self.subscribes.lock().unwrap().len()
    }

    #[allow(dead_code)]
    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribes.lock().unwrap().len()
    }
}

#[async_trait]
impl RemoteHub for RecordingHub {
    async fn subscribe(
        &self,
        request: &HubRequest,
        _secret: &SubscriptionSecret,
    ) -> Result<(), HubError> {
        self.subscribes.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn unsubscribe(&self, request: &HubRequest) -> Result<(), HubError> {
        self.unsubscribes.lock().unwrap().push(request.clone());
        Ok(())
    }
}

// ============================================================================
// Recording observer
// ============================================================================

/// Lifecycle observer that records every reported event.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingObserver {
    #[allow(dead_code)]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl LifecycleObserver for RecordingObserver {
    async fn notify(&self, event: LifecycleEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ============================================================================
// Listener fixture
// ============================================================================

/// A fully wired listener with one follow subscription registered.
pub struct TestListener {
    pub app: Router,
    pub registry: Arc<SubscriptionRegistry>,
    pub hub: Arc<RecordingHub>,
    pub observer: Arc<RecordingObserver>,
    pub handled: Arc<AtomicUsize>,
    pub id: SubscriptionId,
}

/// Build a ready listener with a `follows.to.42` subscription whose handler
/// counts invocations.
#[allow(dead_code)]
pub async fn listener_with_follow_subscription() -> TestListener {
    let config = ServiceConfig::default();
    let hub = Arc::new(RecordingHub::default());
    let observer = Arc::new(RecordingObserver::default());

    let registry = Arc::new(SubscriptionRegistry::new(
        Arc::clone(&hub) as Arc<dyn RemoteHub>,
        config.callback_settings().unwrap(),
        Arc::clone(&observer) as Arc<dyn LifecycleObserver>,
    ));
    registry.mark_ready().await;

    let handled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handled);
    let entry = registry
        .create(Box::new(FollowsToUserSubscription::new("42", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })))
        .await
        .expect("subscription creation should succeed");
    let id = entry.id();

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&registry),
        MessageDeduplicator::new(config.dedup_retention()),
    ));

    let app = create_router(AppState::new(config, dispatcher, Arc::clone(&registry)));

    TestListener {
        app,
        registry,
        hub,
        observer,
        handled,
        id,
    }
}

// ============================================================================
// Request builders
// ============================================================================

/// Compute the platform signature for a delivery to `id`.
#[allow(dead_code)]
pub fn sign(listener: &TestListener, message_id: &str, body: &[u8]) -> String {
    let entry = listener
        .registry
        .resolve(&listener.id)
        .expect("subscription should be registered");
    compute_signature(
        entry.secret(),
        &MessageId::new(message_id).unwrap(),
        TIMESTAMP,
        body,
    )
}

/// Build a platform delivery request for the event endpoint.
#[allow(dead_code)]
pub fn event_request(
    id: &str,
    message_type: &str,
    message_id: &str,
    signature: Option<&str>,
    body: &str,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/event/{}", id))
        .header("x-hub-message-type", message_type)
        .header("x-hub-message-id", message_id)
        .header("x-hub-message-timestamp", TIMESTAMP);
    if let Some(signature) = signature {
        builder = builder.header("x-hub-message-signature", signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// A valid follow-notification body for `follows.to.42`.
#[allow(dead_code)]
pub fn follow_body() -> String {
    serde_json::json!({
        "data": [{
            "from_id": "7",
            "from_name": "alice",
            "to_id": "42",
            "to_name": "bob",
            "followed_at": "2026-01-15T10:29:00Z"
        }]
    })
    .to_string()
}

/// Read a response body to a string.
#[allow(dead_code)]
pub async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
