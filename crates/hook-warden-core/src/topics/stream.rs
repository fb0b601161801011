//! Stream-change topic: a user's stream going live, changing, or going offline.

use super::{first_data_record, required_str};
use crate::hub::HubTopic;
use crate::subscription::{EventSubscription, PayloadError};
use crate::{SubscriptionId, Timestamp};
use serde_json::Value;

/// Details of a live stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Platform-assigned stream id.
    pub id: String,
    /// Broadcasting user.
    pub user_id: String,
    /// Current stream title.
    pub title: String,
    /// Viewer count at notification time.
    pub viewer_count: u64,
    /// When the stream started.
    pub started_at: Timestamp,
}

/// A change to a user's stream.
///
/// The platform signals "stream went offline" by delivering an empty `data`
/// array, so that case is part of the event type rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChangeEvent {
    /// The stream is live; carries its current details.
    Live(StreamInfo),
    /// The stream went offline.
    Offline,
}

impl StreamChangeEvent {
    fn from_payload(payload: &Value) -> Result<Self, PayloadError> {
        let record = match first_data_record(payload)? {
            Some(record) => record,
            None => return Ok(Self::Offline),
        };

        let started_at_raw = required_str(record, "started_at")?;
        let started_at = Timestamp::from_rfc3339(&started_at_raw).map_err(|_| {
            PayloadError::InvalidField {
                field: "started_at".to_string(),
                message: "must be RFC3339 datetime".to_string(),
            }
        })?;

        let viewer_count = record
            .get("viewer_count")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| PayloadError::MissingField {
                field: "viewer_count".to_string(),
            })?;

        Ok(Self::Live(StreamInfo {
            id: required_str(record, "id")?,
            user_id: required_str(record, "user_id")?,
            title: required_str(record, "title")?,
            viewer_count,
            started_at,
        }))
    }
}

/// Handler invoked with each transformed stream change.
pub type StreamHandler = Box<dyn Fn(StreamChangeEvent) + Send + Sync>;

/// Subscription to changes of a user's stream.
///
/// Id format: `stream.changed.<user_id>`.
pub struct StreamChangesSubscription {
    user_id: String,
    handler: StreamHandler,
}

impl StreamChangesSubscription {
    /// Create a subscription for stream changes of `user_id`.
    pub fn new(
        user_id: impl Into<String>,
        handler: impl Fn(StreamChangeEvent) + Send + Sync + 'static,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            handler: Box::new(handler),
        }
    }
}

impl EventSubscription for StreamChangesSubscription {
    fn id(&self) -> SubscriptionId {
        SubscriptionId::from_parts(&["stream", "changed", &self.user_id])
    }

    fn topic(&self) -> HubTopic {
        HubTopic::new(format!("streams?user_id={}", self.user_id))
    }

    fn deliver(&self, payload: &Value) -> Result<(), PayloadError> {
        let event = StreamChangeEvent::from_payload(payload)?;
        (self.handler)(event);
        Ok(())
    }
}
