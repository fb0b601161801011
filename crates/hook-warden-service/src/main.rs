//! # Hook-Warden Service
//!
//! Binary entry point for the Hook-Warden HTTP service.
//!
//! This executable:
//! - Loads configuration from environment and files
//! - Initializes observability (logging)
//! - Builds the remote hub client, registry, and dispatcher
//! - Creates the configured subscriptions (parked until the server is ready)
//! - Starts the renewal scheduler and the HTTP server

mod observer;

use hook_warden_api::{start_server, AppState, ServiceConfig, ServiceError, TopicEntry};
use hook_warden_core::{
    Dispatcher, EventSubscription, HttpRemoteHub, MessageDeduplicator, RenewalScheduler,
    StreamChangeEvent, SubscriptionRegistry,
};
use hook_warden_core::{
    FollowsFromUserSubscription, FollowsToUserSubscription, StreamChangesSubscription,
    UserChangesSubscription,
};
use observer::LogLifecycleObserver;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "hook_warden_service=info,hook_warden_api=info,hook_warden_core=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Hook-Warden Service");

    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order — later sources override earlier ones):
    //  1. /etc/hook-warden/service.yaml    — system-wide defaults
    //  2. ./config/service.yaml            — deployment-local override
    //  3. Path given by HW_CONFIG_FILE env — operator-specified file
    //  4. Environment variables prefixed HW__ (double-underscore separator)
    //     e.g. HW__SERVER__PORT=9090 sets server.port = 9090
    //
    // All service configuration fields carry serde defaults, so absent files
    // or an entirely unconfigured environment produces a valid service config
    // with built-in defaults.  A malformed file or an environment variable
    // that cannot be coerced to the correct type IS a hard error because it
    // indicates deliberate-but-broken operator configuration.
    // -------------------------------------------------------------------------
    let mut config_builder = config::Config::builder()
        .add_source(
            config::File::with_name("/etc/hook-warden/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        )
        .add_source(
            config::File::with_name("config/service")
                .required(false)
                .format(config::FileFormat::Yaml),
        );

    // Optional explicit path supplied by the operator.
    if let Ok(explicit_path) = std::env::var("HW_CONFIG_FILE") {
        if !explicit_path.is_empty() {
            config_builder = config_builder.add_source(
                config::File::with_name(&explicit_path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
            info!(path = %explicit_path, "Loading configuration from explicit path");
        }
    }

    let config = match config_builder
        .add_source(config::Environment::with_prefix("HW").separator("__"))
        .build()
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "Failed to build configuration; aborting");
            std::process::exit(3);
        }
    };

    let service_config: ServiceConfig = match config.try_deserialize() {
        Ok(sc) => sc,
        Err(e) => {
            error!(
                error = %e,
                "Could not deserialize service configuration; aborting. \
                 Fix the configuration and restart."
            );
            std::process::exit(3);
        }
    };

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }

    // -------------------------------------------------------------------------
    // Build the hub client, registry, and dispatcher
    // -------------------------------------------------------------------------
    let (hub_endpoint, topic_base) = match service_config.hub_urls() {
        Ok(urls) => urls,
        Err(e) => {
            error!(error = %e, "Hub configuration is invalid; aborting");
            std::process::exit(3);
        }
    };

    let hub = match HttpRemoteHub::new(hub_endpoint, topic_base) {
        Ok(hub) => Arc::new(hub),
        Err(e) => {
            error!(error = %e, "Failed to construct hub client; aborting");
            std::process::exit(3);
        }
    };

    let callback_settings = match service_config.callback_settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Listener configuration is invalid; aborting");
            std::process::exit(3);
        }
    };

    let registry = Arc::new(SubscriptionRegistry::new(
        hub,
        callback_settings,
        Arc::new(LogLifecycleObserver),
    ));

    // -------------------------------------------------------------------------
    // Create configured subscriptions
    //
    // The registry is not yet marked ready, so these are parked locally; the
    // remote subscribe calls are issued by start_server once the listening
    // socket is bound.  An entry with an unknown topic kind is skipped with
    // an error rather than aborting startup.
    // -------------------------------------------------------------------------
    for entry in &service_config.subscriptions {
        match build_subscription(entry) {
            Some(variant) => {
                let id = variant.id();
                if let Err(e) = registry.create(variant).await {
                    error!(%id, error = %e, "Failed to register configured subscription");
                } else {
                    info!(%id, "Registered configured subscription");
                }
            }
            None => {
                error!(
                    topic = %entry.topic,
                    user_id = %entry.user_id,
                    "Skipping subscription with unknown topic kind in configuration"
                );
            }
        }
    }

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&registry),
        MessageDeduplicator::new(service_config.dedup_retention()),
    ));

    let renewal_handle =
        RenewalScheduler::spawn(Arc::clone(&registry), service_config.renewal_config());

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        "Starting HTTP server"
    );

    let state = AppState::new(service_config, dispatcher, Arc::clone(&registry));

    // Start the server; it marks the registry ready once the socket is bound.
    if let Err(e) = start_server(state).await {
        error!("Failed to start server: {}", e);
        renewal_handle.shutdown().await;

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
            ServiceError::Configuration(_) => 3,
        };

        std::process::exit(exit_code);
    }

    // Graceful shutdown: stop renewing, then cancel every remote lease.
    renewal_handle.shutdown().await;
    registry.dispose_all().await;

    Ok(())
}

// ============================================================================
// Private helpers
// ============================================================================

/// Build a topic variant from a configuration entry.
///
/// Returns `None` for an unknown topic kind. The handlers report events
/// through structured logs; applications embedding the listener as a library
/// supply their own.
fn build_subscription(entry: &TopicEntry) -> Option<Box<dyn EventSubscription>> {
    match entry.topic.as_str() {
        "follows.to" => Some(Box::new(FollowsToUserSubscription::new(
            entry.user_id.clone(),
            |event| {
                info!(
                    from = %event.from_name,
                    to = %event.to_name,
                    followed_at = %event.followed_at,
                    "New follower"
                );
            },
        ))),
        "follows.from" => Some(Box::new(FollowsFromUserSubscription::new(
            entry.user_id.clone(),
            |event| {
                info!(
                    from = %event.from_name,
                    to = %event.to_name,
                    followed_at = %event.followed_at,
                    "New follow"
                );
            },
        ))),
        "stream.changed" => Some(Box::new(StreamChangesSubscription::new(
            entry.user_id.clone(),
            |event| match event {
                StreamChangeEvent::Live(details) => {
                    info!(
                        user_id = %details.user_id,
                        title = %details.title,
                        viewers = details.viewer_count,
                        "Stream changed"
                    );
                }
                StreamChangeEvent::Offline => {
                    info!("Stream went offline");
                }
            },
        ))),
        "user.changed" => Some(Box::new(UserChangesSubscription::new(
            entry.user_id.clone(),
            |event| {
                info!(
                    user_id = %event.id,
                    login = %event.login,
                    "User profile changed"
                );
            },
        ))),
        _ => None,
    }
}
