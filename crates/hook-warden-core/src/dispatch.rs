//! Inbound delivery verification and routing.
//!
//! Every inbound request walks the same state machine: parse the platform
//! headers, resolve the target subscription, branch on the message type,
//! verify the signature, suppress duplicates, and finally hand the payload to
//! the subscription. All failures are resolved here and mapped to a response
//! by the HTTP layer; nothing propagates into handlers.

use crate::dedup::{DeliveryDisposition, MessageDeduplicator};
use crate::registry::SubscriptionRegistry;
use crate::signature::verify_signature;
use crate::subscription::PayloadError;
use crate::{ErrorCategory, MessageId, SubscriptionId};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

// ============================================================================
// Header Constants
// ============================================================================

/// Platform header carrying the delivery's message id.
pub const HEADER_MESSAGE_ID: &str = "x-hub-message-id";
/// Platform header carrying the delivery's timestamp.
pub const HEADER_MESSAGE_TIMESTAMP: &str = "x-hub-message-timestamp";
/// Platform header carrying the delivery's HMAC signature.
pub const HEADER_MESSAGE_SIGNATURE: &str = "x-hub-message-signature";
/// Platform header carrying the message type discriminator.
pub const HEADER_MESSAGE_TYPE: &str = "x-hub-message-type";

// ============================================================================
// Core Types
// ============================================================================

/// Message type discriminator carried by every delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Regular event notification.
    Notification,
    /// Challenge round-trip confirming a new or refreshed subscription.
    Challenge,
    /// The platform unilaterally ended the subscription.
    Revocation,
}

impl MessageType {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "notification" => Some(Self::Notification),
            "verification" => Some(Self::Challenge),
            "revocation" => Some(Self::Revocation),
            _ => None,
        }
    }
}

/// Platform headers extracted from an inbound request.
#[derive(Debug, Clone)]
pub struct InboundHeaders {
    pub message_id: MessageId,
    pub timestamp: String,
    pub signature: Option<String>,
    pub message_type: MessageType,
}

impl InboundHeaders {
    /// Parse headers from an HTTP header map with lowercase keys.
    ///
    /// The signature header may be absent here; its absence is decided at
    /// verification time (fails closed), not at parse time, because challenge
    /// requests are answered without one.
    pub fn from_header_map(headers: &HashMap<String, String>) -> Result<Self, DispatchError> {
        let message_type_raw =
            Self::required(headers, HEADER_MESSAGE_TYPE)?;
        let message_type = MessageType::parse(&message_type_raw).ok_or_else(|| {
            DispatchError::UnknownMessageType {
                value: message_type_raw,
            }
        })?;

        let message_id = MessageId::new(Self::required(headers, HEADER_MESSAGE_ID)?)
            .map_err(|_| DispatchError::MissingHeader {
                header: HEADER_MESSAGE_ID.to_string(),
            })?;

        let timestamp = Self::required(headers, HEADER_MESSAGE_TIMESTAMP)?;
        let signature = headers.get(HEADER_MESSAGE_SIGNATURE).cloned();

        Ok(Self {
            message_id,
            timestamp,
            signature,
            message_type,
        })
    }

    fn required(
        headers: &HashMap<String, String>,
        header: &str,
    ) -> Result<String, DispatchError> {
        headers
            .get(header)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| DispatchError::MissingHeader {
                header: header.to_string(),
            })
    }
}

/// Successful dispatch outcomes, mapped to responses by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Challenge accepted; respond with the literal token as the body.
    Challenge(String),
    /// Notification transformed and handed to the handler.
    Delivered,
    /// Redelivery of an already-handled message; acknowledged without a
    /// handler invocation.
    Duplicate,
    /// Revocation processed; the subscription is gone.
    Revoked,
}

// ============================================================================
// Error Types
// ============================================================================

/// Error raised while dispatching an inbound request.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Missing required header: {header}")]
    MissingHeader { header: String },

    #[error("Unsupported message type: {value}")]
    UnknownMessageType { value: String },

    #[error("No subscription registered for id '{id}'")]
    UnknownSubscription { id: SubscriptionId },

    #[error("Signature verification failed for subscription '{id}'")]
    VerificationFailed { id: SubscriptionId },

    #[error("Request body is not valid JSON: {0}")]
    MalformedBody(#[from] serde_json::Error),

    #[error("Payload transform failed: {0}")]
    MalformedPayload(#[from] PayloadError),
}

impl DispatchError {
    /// Get error category for monitoring.
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::VerificationFailed { .. } => ErrorCategory::Security,
            Self::MissingHeader { .. } => ErrorCategory::Permanent,
            Self::UnknownMessageType { .. } => ErrorCategory::Permanent,
            Self::UnknownSubscription { .. } => ErrorCategory::Permanent,
            Self::MalformedBody(_) => ErrorCategory::Permanent,
            Self::MalformedPayload(_) => ErrorCategory::Permanent,
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Per-request protocol state machine for inbound deliveries.
pub struct Dispatcher {
    registry: Arc<SubscriptionRegistry>,
    dedup: MessageDeduplicator,
}

impl Dispatcher {
    /// Create a dispatcher over the shared registry.
    pub fn new(registry: Arc<SubscriptionRegistry>, dedup: MessageDeduplicator) -> Self {
        Self { registry, dedup }
    }

    /// Process one inbound delivery addressed to `id`.
    ///
    /// Resolution happens before any verification work: the HMAC key is the
    /// per-subscription secret, so an unknown id has nothing to verify
    /// against and short-circuits to not-found. This order is deliberate and
    /// relied upon by the HTTP layer's status mapping.
    #[instrument(skip(self, headers, body), fields(message_id = %headers.message_id))]
    pub async fn dispatch(
        &self,
        id: &SubscriptionId,
        headers: &InboundHeaders,
        body: &Bytes,
    ) -> Result<DispatchOutcome, DispatchError> {
        let entry = self
            .registry
            .resolve(id)
            .ok_or_else(|| DispatchError::UnknownSubscription { id: id.clone() })?;

        // Challenge round-trips are answered before signature verification;
        // the platform is proving endpoint ownership, not yet delivering
        // signed data.
        if headers.message_type == MessageType::Challenge {
            let payload: serde_json::Value = serde_json::from_slice(body)?;
            let token = payload
                .get("challenge")
                .and_then(|v| v.as_str())
                .ok_or_else(|| PayloadError::MissingField {
                    field: "challenge".to_string(),
                })?
                .to_string();

            self.registry.confirm_verified(&entry).await;
            return Ok(DispatchOutcome::Challenge(token));
        }

        // Fails closed: a delivery without a signature header is treated
        // exactly like one with a wrong signature.
        let verified = headers.signature.as_deref().is_some_and(|signature| {
            verify_signature(
                entry.secret(),
                &headers.message_id,
                &headers.timestamp,
                body,
                signature,
            )
        });
        if !verified {
            warn!(
                %id,
                message_id = %headers.message_id,
                "Rejected delivery with missing or invalid signature"
            );
            return Err(DispatchError::VerificationFailed { id: id.clone() });
        }

        // Atomic first-time check; a redelivery is acknowledged as success so
        // the platform stops retrying, but the handler is not invoked again.
        if self.dedup.observe(&headers.message_id) == DeliveryDisposition::Duplicate {
            info!(%id, message_id = %headers.message_id, "Suppressed duplicate delivery");
            return Ok(DispatchOutcome::Duplicate);
        }

        if headers.message_type == MessageType::Revocation {
            self.registry.discard_revoked(id).await;
            return Ok(DispatchOutcome::Revoked);
        }

        let payload: serde_json::Value = serde_json::from_slice(body)?;
        entry.deliver(&payload)?;

        info!(%id, message_id = %headers.message_id, "Delivery handled");
        Ok(DispatchOutcome::Delivered)
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
