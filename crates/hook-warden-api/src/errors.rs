//! Error types for the HTTP service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use hook_warden_core::DispatchError;
use tracing::warn;

/// Event handler errors with HTTP status code mapping
///
/// Every dispatch failure is resolved here and mapped to a status code the
/// platform understands:
///
/// - `400 Bad Request`: missing/unknown platform headers, unparseable body,
///   payload transform failure — permanent, the platform should not retry
/// - `403 Forbidden`: signature verification failure — logged as a potential
///   security event, never reaches a handler
/// - `404 Not Found`: the id names no registered subscription
///
/// Duplicate deliveries are *not* errors: they are acknowledged with success
/// (the platform interprets non-2xx as "redeliver") and surface as a normal
/// dispatch outcome, never through this type.
///
/// # Security Considerations
///
/// Response bodies carry the error message but never secret material;
/// signature failures deliberately share the platform's generic wording so
/// response content does not reveal which check failed first.
#[derive(Debug, thiserror::Error)]
pub enum EventHandlerError {
    /// Dispatch pipeline failure
    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    /// The path segment is not even a well-formed subscription id
    ///
    /// Maps to `404 Not Found`: a malformed id cannot name a registry entry,
    /// and the response is indistinguishable from an unknown id.
    #[error("No subscription registered for id '{id}'")]
    InvalidId { id: String },
}

impl IntoResponse for EventHandlerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Dispatch(e) => match e {
                DispatchError::UnknownSubscription { .. } => {
                    (StatusCode::NOT_FOUND, self.to_string())
                }
                DispatchError::VerificationFailed { id } => {
                    warn!(%id, "Rejected delivery with invalid signature");
                    (StatusCode::FORBIDDEN, "Signature verification failed".to_string())
                }
                DispatchError::MissingHeader { .. }
                | DispatchError::UnknownMessageType { .. }
                | DispatchError::MalformedBody(_)
                | DispatchError::MalformedPayload(_) => {
                    (StatusCode::BAD_REQUEST, self.to_string())
                }
            },
            Self::InvalidId { .. } => (StatusCode::NOT_FOUND, self.to_string()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        (status, Json(body)).into_response()
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;
