//! Tests for configuration and routing.

use super::*;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use hook_warden_core::{
    HubError, HubRequest, MessageDeduplicator, NoopObserver, RemoteHub, SubscriptionSecret,
};
use tower::ServiceExt;

// ============================================================================
// Test fixtures
// ============================================================================

struct OkHub;

#[async_trait]
impl RemoteHub for OkHub {
    async fn subscribe(
        &self,
        _request: &HubRequest,
        _secret: &SubscriptionSecret,
    ) -> Result<(), HubError> {
        Ok(())
    }

    async fn unsubscribe(&self, _request: &HubRequest) -> Result<(), HubError> {
        Ok(())
    }
}

fn state_with(config: ServiceConfig) -> AppState {
    let registry = Arc::new(SubscriptionRegistry::new(
        Arc::new(OkHub),
        config.callback_settings().unwrap(),
        Arc::new(NoopObserver),
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&registry),
        MessageDeduplicator::new(config.dedup_retention()),
    ));
    AppState::new(config, dispatcher, registry)
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_default_config_is_valid() {
    let config = ServiceConfig::default();
    assert!(config.validate().is_ok());
}

#[test]
fn test_validation_rejects_bad_urls() {
    let mut config = ServiceConfig::default();
    config.listener.external_url = "not a url".to_string();
    assert!(config.validate().is_err());

    let mut config = ServiceConfig::default();
    config.hub.endpoint = "ftp://api.example.com/hub".to_string();
    assert!(config.validate().is_err());
}

#[test]
fn test_validation_rejects_zero_durations() {
    let mut config = ServiceConfig::default();
    config.listener.lease_seconds = 0;
    assert!(config.validate().is_err());

    let mut config = ServiceConfig::default();
    config.dedup.retention_seconds = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validation_rejects_horizon_shorter_than_interval() {
    let mut config = ServiceConfig::default();
    config.renewal.interval_seconds = 120;
    config.renewal.horizon_seconds = 60;
    assert!(config.validate().is_err());
}

#[test]
fn test_normalized_prefix() {
    let mut listener = ListenerConfig::default();
    assert_eq!(listener.normalized_prefix(), None);

    listener.path_prefix = "/".to_string();
    assert_eq!(listener.normalized_prefix(), None);

    listener.path_prefix = "hooks".to_string();
    assert_eq!(listener.normalized_prefix(), Some("/hooks".to_string()));

    listener.path_prefix = "/hooks/".to_string();
    assert_eq!(listener.normalized_prefix(), Some("/hooks".to_string()));
}

#[test]
fn test_callback_settings_carry_configured_lease() {
    let mut config = ServiceConfig::default();
    config.listener.lease_seconds = 4242;
    let settings = config.callback_settings().unwrap();
    assert_eq!(settings.default_lease_seconds(), 4242);
}

#[test]
fn test_duration_mappings() {
    let config = ServiceConfig::default();
    let renewal = config.renewal_config();
    assert_eq!(renewal.interval, Duration::from_secs(60));
    assert_eq!(renewal.horizon, Duration::from_secs(900));
    assert_eq!(config.dedup_retention(), Duration::from_secs(600));
}

// ============================================================================
// Routing
// ============================================================================

#[tokio::test]
async fn test_health_probe_succeeds_unconditionally() {
    let app = create_router(state_with(ServiceConfig::default()));

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.subscriptions, 0);
}

#[tokio::test]
async fn test_legacy_path_answers_gone() {
    let app = create_router(state_with(ServiceConfig::default()));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/9999")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GONE);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "gone");
}

#[tokio::test]
async fn test_unknown_subscription_is_not_found() {
    let app = create_router(state_with(ServiceConfig::default()));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/event/follows.to.9999")
                .header("x-hub-message-type", "notification")
                .header("x-hub-message-id", "m1")
                .header("x-hub-message-timestamp", "2026-01-15T10:30:00Z")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_id_is_indistinguishable_from_unknown() {
    let app = create_router(state_with(ServiceConfig::default()));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/event/double..dot")
                .header("x-hub-message-type", "notification")
                .header("x-hub-message-id", "m1")
                .header("x-hub-message-timestamp", "2026-01-15T10:30:00Z")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_routes_mount_under_configured_prefix() {
    let mut config = ServiceConfig::default();
    config.listener.path_prefix = "hooks".to_string();
    let app = create_router(state_with(config));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/hooks").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/hooks/1234")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::GONE);

    // Nothing is served outside the prefix
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_platform_headers_are_bad_request() {
    let app = create_router(state_with(ServiceConfig::default()));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/event/follows.to.42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // Headers are parsed before resolution, so even an unknown id with no
    // platform headers reports the malformed request first.
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
