//! Follow-event topics: follows *to* a user and follows *from* a user.

use super::{first_data_record, required_str};
use crate::hub::HubTopic;
use crate::subscription::{EventSubscription, PayloadError};
use crate::{SubscriptionId, Timestamp};
use serde_json::Value;

/// A single follow relationship change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowEvent {
    /// User who followed.
    pub from_id: String,
    /// Display name of the user who followed.
    pub from_name: String,
    /// User who was followed.
    pub to_id: String,
    /// Display name of the user who was followed.
    pub to_name: String,
    /// When the follow happened.
    pub followed_at: Timestamp,
}

impl FollowEvent {
    fn from_payload(payload: &Value) -> Result<Self, PayloadError> {
        let record = first_data_record(payload)?.ok_or_else(|| PayloadError::MissingField {
            field: "data[0]".to_string(),
        })?;

        let followed_at_raw = required_str(record, "followed_at")?;
        let followed_at = Timestamp::from_rfc3339(&followed_at_raw).map_err(|_| {
            PayloadError::InvalidField {
                field: "followed_at".to_string(),
                message: "must be RFC3339 datetime".to_string(),
            }
        })?;

        Ok(Self {
            from_id: required_str(record, "from_id")?,
            from_name: required_str(record, "from_name")?,
            to_id: required_str(record, "to_id")?,
            to_name: required_str(record, "to_name")?,
            followed_at,
        })
    }
}

/// Handler invoked with each transformed follow event.
pub type FollowHandler = Box<dyn Fn(FollowEvent) + Send + Sync>;

/// Subscription to follows received by a user.
///
/// Id format: `follows.to.<user_id>`.
pub struct FollowsToUserSubscription {
    user_id: String,
    handler: FollowHandler,
}

impl FollowsToUserSubscription {
    /// Create a subscription for follows received by `user_id`.
    pub fn new(
        user_id: impl Into<String>,
        handler: impl Fn(FollowEvent) + Send + Sync + 'static,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            handler: Box::new(handler),
        }
    }
}

impl EventSubscription for FollowsToUserSubscription {
    fn id(&self) -> SubscriptionId {
        SubscriptionId::from_parts(&["follows", "to", &self.user_id])
    }

    fn topic(&self) -> HubTopic {
        HubTopic::new(format!("users/follows?first=1&to_id={}", self.user_id))
    }

    fn deliver(&self, payload: &Value) -> Result<(), PayloadError> {
        let event = FollowEvent::from_payload(payload)?;
        (self.handler)(event);
        Ok(())
    }
}

/// Subscription to follows performed by a user.
///
/// Id format: `follows.from.<user_id>`.
pub struct FollowsFromUserSubscription {
    user_id: String,
    handler: FollowHandler,
}

impl FollowsFromUserSubscription {
    /// Create a subscription for follows performed by `user_id`.
    pub fn new(
        user_id: impl Into<String>,
        handler: impl Fn(FollowEvent) + Send + Sync + 'static,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            handler: Box::new(handler),
        }
    }
}

impl EventSubscription for FollowsFromUserSubscription {
    fn id(&self) -> SubscriptionId {
        SubscriptionId::from_parts(&["follows", "from", &self.user_id])
    }

    fn topic(&self) -> HubTopic {
        HubTopic::new(format!("users/follows?first=1&from_id={}", self.user_id))
    }

    fn deliver(&self, payload: &Value) -> Result<(), PayloadError> {
        let event = FollowEvent::from_payload(payload)?;
        (self.handler)(event);
        Ok(())
    }
}
