//! Concrete topic variants and their typed events.
//!
//! The platform wraps every notification payload in a `{"data": [ ... ]}`
//! envelope; each variant pulls the first record out of that envelope and
//! maps it onto its typed event before invoking the registered handler.

use crate::subscription::PayloadError;
use serde_json::Value;

mod follows;
mod stream;
mod user;

pub use follows::{
    FollowEvent, FollowHandler, FollowsFromUserSubscription, FollowsToUserSubscription,
};
pub use stream::{StreamChangeEvent, StreamChangesSubscription, StreamHandler, StreamInfo};
pub use user::{UserChangeEvent, UserChangesSubscription, UserHandler};

/// Extract the first record from the platform's `{"data": [ ... ]}` envelope.
///
/// Returns `Ok(None)` when the array is present but empty; some topics use an
/// empty array as a meaningful signal (a stream going offline).
pub(crate) fn first_data_record(payload: &Value) -> Result<Option<&Value>, PayloadError> {
    let data = payload
        .get("data")
        .ok_or_else(|| PayloadError::MissingField {
            field: "data".to_string(),
        })?
        .as_array()
        .ok_or_else(|| PayloadError::InvalidField {
            field: "data".to_string(),
            message: "must be an array".to_string(),
        })?;

    Ok(data.first())
}

/// Extract a required string field from a payload record.
pub(crate) fn required_str(record: &Value, field: &str) -> Result<String, PayloadError> {
    record
        .get(field)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| PayloadError::MissingField {
            field: field.to_string(),
        })
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
