//! Remote hub client seam.
//!
//! The registry talks to the remote platform's subscription hub exclusively
//! through the narrow [`RemoteHub`] trait: one call to request a lease, one
//! to cancel it. [`HttpRemoteHub`] is the production implementation speaking
//! the platform's hub-mode REST convention over reqwest. Tests substitute
//! their own implementations.

use crate::secret::SubscriptionSecret;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

// ============================================================================
// Request Types
// ============================================================================

/// Remote topic descriptor: path and query relative to the platform API base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubTopic(String);

impl HubTopic {
    /// Wrap a topic path (e.g. `users/follows?first=1&to_id=42`).
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HubTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Parameters of a subscribe or unsubscribe call.
///
/// The secret is deliberately not part of this struct; it is passed to
/// [`RemoteHub::subscribe`] by reference so request values can be logged and
/// stored without carrying secret material.
#[derive(Debug, Clone)]
pub struct HubRequest {
    /// Topic the subscription targets.
    pub topic: HubTopic,
    /// Public callback URL the platform should deliver to.
    pub callback_url: String,
    /// Requested lease duration in seconds.
    pub lease_seconds: u64,
}

// ============================================================================
// Error Types
// ============================================================================

/// Error raised by hub calls.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// Network failure reaching the platform; retryable.
    #[error("Hub transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The platform refused the request (quota exceeded, invalid parameters).
    /// Not retried automatically.
    #[error("Hub rejected the request: status {status}: {detail}")]
    Rejected { status: u16, detail: String },
}

impl HubError {
    /// Check if error is transient and should be retried.
    ///
    /// Platform-side 5xx responses count as transient; 4xx rejections do not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Rejected { status, .. } => *status >= 500,
        }
    }
}

// ============================================================================
// Trait
// ============================================================================

/// Narrow capability for requesting and cancelling subscriptions against the
/// remote platform.
#[async_trait]
pub trait RemoteHub: Send + Sync {
    /// Request (or refresh) a subscription lease.
    ///
    /// The platform confirms asynchronously with a challenge delivery to the
    /// callback URL; a successful return here only means the request was
    /// accepted.
    async fn subscribe(
        &self,
        request: &HubRequest,
        secret: &SubscriptionSecret,
    ) -> Result<(), HubError>;

    /// Cancel a subscription lease.
    ///
    /// Idempotent: cancelling a subscription the platform no longer knows
    /// about succeeds as a no-op.
    async fn unsubscribe(&self, request: &HubRequest) -> Result<(), HubError>;
}

// ============================================================================
// HttpRemoteHub
// ============================================================================

/// Production [`RemoteHub`] speaking the platform's hub-mode REST convention.
///
/// Both operations POST to the hub endpoint with a `hub.mode` discriminator;
/// the subscribe call additionally carries the per-subscription secret that
/// the platform will use to sign deliveries.
pub struct HttpRemoteHub {
    client: reqwest::Client,
    hub_endpoint: Url,
    topic_base: String,
}

impl HttpRemoteHub {
    /// Timeout applied to every hub call.
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Create a hub client.
    ///
    /// `hub_endpoint` is the full URL of the platform's subscription hub;
    /// `topic_base` is the API base that topic paths are resolved against.
    pub fn new(hub_endpoint: Url, topic_base: Url) -> Result<Self, HubError> {
        let client = reqwest::Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            hub_endpoint,
            topic_base: topic_base.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn topic_url(&self, topic: &HubTopic) -> String {
        format!("{}/{}", self.topic_base, topic.as_str())
    }

    async fn send_mode(
        &self,
        mode: &str,
        request: &HubRequest,
        secret: Option<&SubscriptionSecret>,
    ) -> Result<(), HubError> {
        let mut body = serde_json::json!({
            "hub.callback": request.callback_url,
            "hub.mode": mode,
            "hub.topic": self.topic_url(&request.topic),
            "hub.lease_seconds": request.lease_seconds,
        });
        if let Some(secret) = secret {
            body["hub.secret"] = secret.expose_secret().into();
        }

        let response = self
            .client
            .post(self.hub_endpoint.clone())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(mode, topic = %request.topic, "Hub accepted request");
            return Ok(());
        }

        // The platform forgets subscriptions on its own (lease expiry,
        // revocation); an unsubscribe for one of those must still succeed.
        if mode == "unsubscribe" && matches!(status.as_u16(), 404 | 410) {
            debug!(topic = %request.topic, "Subscription already gone on the platform");
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        Err(HubError::Rejected {
            status: status.as_u16(),
            detail,
        })
    }
}

#[async_trait]
impl RemoteHub for HttpRemoteHub {
    #[instrument(skip(self, secret), fields(topic = %request.topic))]
    async fn subscribe(
        &self,
        request: &HubRequest,
        secret: &SubscriptionSecret,
    ) -> Result<(), HubError> {
        self.send_mode("subscribe", request, Some(secret)).await
    }

    #[instrument(skip(self), fields(topic = %request.topic))]
    async fn unsubscribe(&self, request: &HubRequest) -> Result<(), HubError> {
        self.send_mode("unsubscribe", request, None).await
    }
}

#[cfg(test)]
#[path = "hub_tests.rs"]
mod tests;
