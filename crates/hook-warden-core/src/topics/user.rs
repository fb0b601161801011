//! User-change topic: profile updates for a user.

use super::{first_data_record, required_str};
use crate::hub::HubTopic;
use crate::subscription::{EventSubscription, PayloadError};
use crate::SubscriptionId;
use serde_json::Value;

/// A change to a user's profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserChangeEvent {
    /// Platform-assigned user id.
    pub id: String,
    /// Login name.
    pub login: String,
    /// Display name.
    pub display_name: String,
    /// Profile description.
    pub description: String,
}

impl UserChangeEvent {
    fn from_payload(payload: &Value) -> Result<Self, PayloadError> {
        let record = first_data_record(payload)?.ok_or_else(|| PayloadError::MissingField {
            field: "data[0]".to_string(),
        })?;

        Ok(Self {
            id: required_str(record, "id")?,
            login: required_str(record, "login")?,
            display_name: required_str(record, "display_name")?,
            description: required_str(record, "description")?,
        })
    }
}

/// Handler invoked with each transformed user change.
pub type UserHandler = Box<dyn Fn(UserChangeEvent) + Send + Sync>;

/// Subscription to profile changes of a user.
///
/// Id format: `user.changed.<user_id>`.
pub struct UserChangesSubscription {
    user_id: String,
    handler: UserHandler,
}

impl UserChangesSubscription {
    /// Create a subscription for profile changes of `user_id`.
    pub fn new(
        user_id: impl Into<String>,
        handler: impl Fn(UserChangeEvent) + Send + Sync + 'static,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            handler: Box::new(handler),
        }
    }
}

impl EventSubscription for UserChangesSubscription {
    fn id(&self) -> SubscriptionId {
        SubscriptionId::from_parts(&["user", "changed", &self.user_id])
    }

    fn topic(&self) -> HubTopic {
        HubTopic::new(format!("users?id={}", self.user_id))
    }

    fn deliver(&self, payload: &Value) -> Result<(), PayloadError> {
        let event = UserChangeEvent::from_payload(payload)?;
        (self.handler)(event);
        Ok(())
    }
}
