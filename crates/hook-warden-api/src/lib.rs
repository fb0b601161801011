//! # Hook-Warden HTTP Service
//!
//! HTTP surface for the Hook-Warden subscription listener.
//!
//! This service provides:
//! - The per-subscription event endpoint the platform delivers to
//!   (`POST /event/{id}`), answering challenges, notifications, and
//!   revocations
//! - A deprecation endpoint on the retired legacy path (`POST /{id}`)
//! - A health probe used to confirm the endpoint is reachable before any
//!   subscriptions are created

// Public modules
pub mod errors;

pub use errors::{ConfigError, EventHandlerError, ServiceError};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use hook_warden_core::{
    CallbackSettings, DispatchOutcome, Dispatcher, InboundHeaders, RenewalConfig, SubscriptionId,
    SubscriptionRegistry,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, instrument, warn};
use url::Url;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: ServiceConfig,

    /// Dispatcher for inbound deliveries
    pub dispatcher: Arc<Dispatcher>,

    /// Registry of active subscriptions
    pub registry: Arc<SubscriptionRegistry>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: ServiceConfig,
        dispatcher: Arc<Dispatcher>,
        registry: Arc<SubscriptionRegistry>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            registry,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Listener identity and lease settings
    pub listener: ListenerConfig,

    /// Lease renewal settings
    pub renewal: RenewalSettings,

    /// Duplicate-delivery suppression settings
    pub dedup: DedupSettings,

    /// Remote hub endpoints
    pub hub: HubSettings,

    /// Subscriptions created at startup
    pub subscriptions: Vec<TopicEntry>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Listener identity and lease settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Public base URL the listener is reachable under, including any mount
    /// prefix. The platform delivers to `{external_url}/event/{id}`.
    pub external_url: String,

    /// Path prefix the routes are mounted under (must match the path portion
    /// of `external_url`). Empty for the root.
    pub path_prefix: String,

    /// Lease duration requested for subscriptions that do not specify one
    pub lease_seconds: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            external_url: "http://localhost:8080".to_string(),
            path_prefix: String::new(),
            lease_seconds: CallbackSettings::DEFAULT_LEASE_SECONDS,
        }
    }
}

impl ListenerConfig {
    /// Mount prefix normalized to `/prefix` form, or `None` for the root.
    pub fn normalized_prefix(&self) -> Option<String> {
        let trimmed = self.path_prefix.trim_matches('/');
        if trimmed.is_empty() {
            None
        } else {
            Some(format!("/{}", trimmed))
        }
    }
}

/// Lease renewal settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenewalSettings {
    /// How often the registry is scanned, in seconds
    pub interval_seconds: u64,

    /// How far ahead of the lease deadline renewal starts, in seconds
    pub horizon_seconds: u64,
}

impl Default for RenewalSettings {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            horizon_seconds: 900,
        }
    }
}

/// Duplicate-delivery suppression settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupSettings {
    /// How long message ids are remembered, in seconds. Must exceed the
    /// platform's redelivery window.
    pub retention_seconds: u64,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            retention_seconds: 600,
        }
    }
}

/// Remote hub endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubSettings {
    /// Full URL of the platform's subscription hub
    pub endpoint: String,

    /// API base that topic paths are resolved against
    pub topic_base: String,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://api.example.com/webhooks/hub".to_string(),
            topic_base: "https://api.example.com/v1".to_string(),
        }
    }
}

/// A subscription to create at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicEntry {
    /// Topic kind: `follows.to`, `follows.from`, `stream.changed`, or
    /// `user.changed`
    pub topic: String,

    /// User the topic targets
    pub user_id: String,
}

impl ServiceConfig {
    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parse_url("listener.external_url", &self.listener.external_url)?;
        self.parse_url("hub.endpoint", &self.hub.endpoint)?;
        self.parse_url("hub.topic_base", &self.hub.topic_base)?;

        if self.listener.lease_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "listener.lease_seconds must be positive".to_string(),
            });
        }

        if self.renewal.interval_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "renewal.interval_seconds must be positive".to_string(),
            });
        }

        // A horizon shorter than the tick interval could skip straight past
        // the renewal window.
        if self.renewal.horizon_seconds < self.renewal.interval_seconds {
            return Err(ConfigError::Invalid {
                message: "renewal.horizon_seconds must be at least renewal.interval_seconds"
                    .to_string(),
            });
        }

        if self.dedup.retention_seconds == 0 {
            return Err(ConfigError::Invalid {
                message: "dedup.retention_seconds must be positive".to_string(),
            });
        }

        Ok(())
    }

    /// Callback settings for the registry, derived from the listener section.
    pub fn callback_settings(&self) -> Result<CallbackSettings, ConfigError> {
        let external_url = self.parse_url("listener.external_url", &self.listener.external_url)?;
        Ok(CallbackSettings::new(external_url)
            .with_default_lease_seconds(self.listener.lease_seconds))
    }

    /// Hub endpoint and topic base as parsed URLs.
    pub fn hub_urls(&self) -> Result<(Url, Url), ConfigError> {
        Ok((
            self.parse_url("hub.endpoint", &self.hub.endpoint)?,
            self.parse_url("hub.topic_base", &self.hub.topic_base)?,
        ))
    }

    /// Renewal scheduler configuration.
    pub fn renewal_config(&self) -> RenewalConfig {
        RenewalConfig {
            interval: Duration::from_secs(self.renewal.interval_seconds),
            horizon: Duration::from_secs(self.renewal.horizon_seconds),
        }
    }

    /// Dedup retention window.
    pub fn dedup_retention(&self) -> Duration {
        Duration::from_secs(self.dedup.retention_seconds)
    }

    fn parse_url(&self, field: &str, value: &str) -> Result<Url, ConfigError> {
        let url = Url::parse(value).map_err(|e| ConfigError::Invalid {
            message: format!("{} is not a valid URL: {}", field, e),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                message: format!("{} must use http or https", field),
            });
        }
        Ok(url)
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints.
///
/// The current-convention event route and the legacy route can never capture
/// each other's requests: `/event/{id}` is two path segments, the legacy
/// `/{id}` exactly one, and the legacy handler never consults the registry —
/// it answers every request with the deprecation response.
pub fn create_router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/", get(handle_health_check))
        .route("/event/{id}", post(handle_event))
        .route("/{id}", post(handle_legacy_drop));

    let routes = match state.config.listener.normalized_prefix() {
        Some(prefix) => Router::new().nest(&prefix, routes),
        None => routes,
    };

    routes
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server with graceful shutdown.
///
/// The listening socket is bound before the registry is marked ready: once
/// `bind` returns, the kernel queues incoming connections, so confirmation
/// challenges sent by the platform immediately after a subscribe call are
/// not lost even if they arrive while startup is still completing.
pub async fn start_server(state: AppState) -> Result<(), ServiceError> {
    let address = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );

    let registry = Arc::clone(&state.registry);
    let app = create_router(state);

    let listener =
        tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: address.clone(),
                message: e.to_string(),
            })?;

    info!(%address, "HTTP server listening");

    // Readiness gate: the endpoint is accepting requests now, so parked
    // subscriptions can be subscribed against the platform.
    registry.mark_ready().await;

    let shutdown_signal = async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C signal handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
            },
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown");
            },
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// Handle an inbound delivery on the event endpoint.
///
/// Challenges are answered with the literal token as the response body;
/// accepted notifications, suppressed duplicates, and processed revocations
/// all acknowledge with `204 No Content` so the platform stops redelivering.
#[instrument(skip(state, headers, body), fields(subscription_id = %id))]
pub async fn handle_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, EventHandlerError> {
    // An id that fails validation cannot name a registry entry; treat it the
    // same as an unknown subscription rather than leaking the difference.
    let subscription_id =
        SubscriptionId::new(id.clone()).map_err(|_| EventHandlerError::InvalidId { id })?;

    let header_map: HashMap<String, String> = headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_lowercase(),
                v.to_str().unwrap_or("").to_string(),
            )
        })
        .collect();

    let inbound = InboundHeaders::from_header_map(&header_map)?;

    let outcome = state
        .dispatcher
        .dispatch(&subscription_id, &inbound, &body)
        .await?;

    match outcome {
        DispatchOutcome::Challenge(token) => Ok((StatusCode::OK, token).into_response()),
        DispatchOutcome::Delivered | DispatchOutcome::Duplicate | DispatchOutcome::Revoked => {
            Ok(StatusCode::NO_CONTENT.into_response())
        }
    }
}

/// Reject deliveries on the retired single-path convention.
///
/// Callers still on the old convention get an explicit, actionable signal
/// instead of silent data loss; nothing on this path ever reaches a handler.
#[instrument(skip(_state))]
pub async fn handle_legacy_drop(
    State(_state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    warn!(%id, "Rejected delivery on retired legacy webhook path");

    let body = serde_json::json!({
        "error": "gone",
        "message": "The legacy webhook path has been retired. \
                    Re-create the subscription against the /event/{id} endpoint.",
    });
    (StatusCode::GONE, Json(body)).into_response()
}

/// Liveness probe.
///
/// Answers unconditionally with success, independent of subscription state;
/// used to confirm the endpoint is reachable before subscriptions are
/// created.
pub async fn handle_health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        subscriptions: state.registry.len(),
    })
}

/// Health probe response body
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub subscriptions: usize,
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
