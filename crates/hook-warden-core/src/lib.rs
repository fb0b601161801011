//! # Hook-Warden Core
//!
//! Core business logic for the Hook-Warden subscription listener.
//!
//! This crate contains the domain logic for managing event-hub subscriptions
//! against a remote platform: creating and renewing subscription leases,
//! verifying the HMAC signatures of inbound deliveries, suppressing duplicate
//! deliveries, and routing notifications to typed per-topic handlers.
//!
//! ## Architecture
//!
//! The core follows clean architecture principles:
//! - Business logic depends only on trait abstractions
//! - The remote hub client and lifecycle observer are injected at runtime
//! - Topic variants implement one shared [`EventSubscription`] contract
//!
//! ## Usage
//!
//! ```rust
//! use hook_warden_core::SubscriptionId;
//!
//! // Subscription ids are deterministic: the same topic parameters always
//! // produce the same id.
//! let id = SubscriptionId::from_parts(&["follows", "to", "42"]);
//! assert_eq!(id.as_str(), "follows.to.42");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Standard result type for hook-warden operations
pub type HookWardenResult<T> = Result<T, HookWardenError>;

// ============================================================================
// Domain Identifier Types
// ============================================================================

/// Unique identifier for an event-hub subscription.
///
/// Derived deterministically from the topic and its parameters
/// (e.g. `follows.to.42`), so the id computed from an inbound request path
/// always resolves to the correct registry entry or reliably signals that no
/// such subscription exists. Never contains randomness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    /// Create a new subscription id with validation.
    ///
    /// # Validation Rules
    /// - Must be 1-128 characters
    /// - Must contain only printable ASCII without whitespace or slashes
    /// - Must not start or end with a dot, or contain consecutive dots
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();

        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "subscription_id".to_string(),
            });
        }

        if value.len() > 128 {
            return Err(ValidationError::TooLong {
                field: "subscription_id".to_string(),
                max_length: 128,
            });
        }

        if !value
            .chars()
            .all(|c| c.is_ascii_graphic() && c != '/' && c != '\\')
        {
            return Err(ValidationError::InvalidCharacters {
                field: "subscription_id".to_string(),
                invalid_chars: "non-ASCII, whitespace, or slashes".to_string(),
            });
        }

        if value.starts_with('.') || value.ends_with('.') || value.contains("..") {
            return Err(ValidationError::InvalidFormat {
                field: "subscription_id".to_string(),
                message: "consecutive, leading, or trailing dots not allowed".to_string(),
            });
        }

        Ok(Self(value))
    }

    /// Create a subscription id from dot-joined topic segments.
    ///
    /// Topic variants supply fixed segment literals plus their own parameters,
    /// so the result is guaranteed to be valid if the inputs are valid.
    pub fn from_parts(parts: &[&str]) -> Self {
        Self(parts.join("."))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubscriptionId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// Opaque platform-assigned identifier for a single delivery.
///
/// The platform reuses the same message id when it redelivers a notification,
/// which is what makes duplicate suppression possible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Create a new message id; must be non-empty.
    pub fn new(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if value.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }
        Ok(Self(value))
    }

    /// Get string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Time Types
// ============================================================================

/// UTC timestamp used for lease expiry and dedup retention arithmetic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parse timestamp from RFC3339 string
    pub fn from_rfc3339(s: &str) -> Result<Self, ValidationError> {
        let dt = DateTime::parse_from_rfc3339(s)
            .map_err(|_| ValidationError::InvalidFormat {
                field: "timestamp".to_string(),
                message: "must be RFC3339 datetime".to_string(),
            })?
            .with_timezone(&Utc);
        Ok(Self(dt))
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Add seconds to timestamp
    pub fn add_seconds(&self, seconds: u64) -> Self {
        Self(self.0 + chrono::Duration::seconds(seconds as i64))
    }

    /// Add a standard duration to timestamp
    pub fn add_duration(&self, duration: Duration) -> Self {
        Self(self.0 + chrono::Duration::from_std(duration).unwrap_or_default())
    }

    /// Get duration since another timestamp (zero if `other` is later)
    pub fn duration_since(&self, other: Self) -> Duration {
        self.0
            .signed_duration_since(other.0)
            .to_std()
            .unwrap_or_default()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// High-level error categorization for retry and alerting decisions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Temporary failures that should be retried
    Transient,
    /// Permanent failures that won't succeed on retry
    Permanent,
    /// Security-related failures requiring immediate attention
    Security,
    /// Configuration errors preventing startup
    Configuration,
}

/// Error type for input validation failures
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: String },

    #[error("Field '{field}' has invalid format: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Field '{field}' exceeds maximum length of {max_length}")]
    TooLong { field: String, max_length: usize },

    #[error("Field '{field}' contains invalid characters: {invalid_chars}")]
    InvalidCharacters {
        field: String,
        invalid_chars: String,
    },
}

/// Top-level error type for hook-warden operations
#[derive(Debug, thiserror::Error)]
pub enum HookWardenError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Registry error: {0}")]
    Registry(#[from] registry::RegistryError),

    #[error("Hub error: {0}")]
    Hub(#[from] hub::HubError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] dispatch::DispatchError),

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl HookWardenError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Hub(hub_error) => hub_error.is_transient(),
            Self::Registry(registry::RegistryError::Subscribe(hub_error)) => {
                hub_error.is_transient()
            }
            Self::Registry(registry::RegistryError::Duplicate { .. }) => false,
            Self::Validation(_) => false,
            Self::Dispatch(_) => false,
            Self::Configuration { .. } => false,
        }
    }

    /// Get error category for monitoring and alerting
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Permanent,
            Self::Registry(registry::RegistryError::Subscribe(hub_error)) => {
                if hub_error.is_transient() {
                    ErrorCategory::Transient
                } else {
                    ErrorCategory::Permanent
                }
            }
            Self::Registry(_) => ErrorCategory::Permanent,
            Self::Hub(hub_error) => {
                if hub_error.is_transient() {
                    ErrorCategory::Transient
                } else {
                    ErrorCategory::Permanent
                }
            }
            Self::Dispatch(dispatch_error) => dispatch_error.error_category(),
            Self::Configuration { .. } => ErrorCategory::Configuration,
        }
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Per-subscription secret generation and handling
pub mod secret;

/// HMAC-SHA256 signature computation and verification
pub mod signature;

/// Duplicate-delivery suppression
pub mod dedup;

/// Subscription entity, status, and the shared topic contract
pub mod subscription;

/// Concrete topic variants and their typed events
pub mod topics;

/// Remote hub client seam for subscribe/unsubscribe calls
pub mod hub;

/// In-memory table of active subscriptions
pub mod registry;

/// Background lease renewal
pub mod renewal;

/// Inbound delivery verification and routing
pub mod dispatch;

/// Lifecycle event reporting hook
pub mod observer;

// Re-export key types for convenience
pub use dedup::{DeliveryDisposition, MessageDeduplicator};
pub use dispatch::{
    DispatchError, DispatchOutcome, Dispatcher, InboundHeaders, MessageType, HEADER_MESSAGE_ID,
    HEADER_MESSAGE_SIGNATURE, HEADER_MESSAGE_TIMESTAMP, HEADER_MESSAGE_TYPE,
};
pub use hub::{HttpRemoteHub, HubError, HubRequest, HubTopic, RemoteHub};
pub use observer::{LifecycleEvent, LifecycleObserver, NoopObserver};
pub use registry::{CallbackSettings, RegistryError, SubscriptionRegistry};
pub use renewal::{RenewalConfig, RenewalHandle, RenewalScheduler};
pub use secret::SubscriptionSecret;
pub use signature::{compute_signature, verify_signature};
pub use subscription::{
    EventSubscription, ManagedSubscription, PayloadError, SubscriptionStatus,
};
pub use topics::{
    FollowEvent, FollowsFromUserSubscription, FollowsToUserSubscription, StreamChangeEvent,
    StreamChangesSubscription, StreamInfo, UserChangeEvent, UserChangesSubscription,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
