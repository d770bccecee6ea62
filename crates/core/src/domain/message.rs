use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

pub const USER_MESSAGE_KIND: &str = "message";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// A chat message normalized at the ingress boundary.
///
/// Once queued a message is never mutated; it is either kept as-is or removed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub user_id: UserId,
    pub email_address: Option<String>,
    pub channel_id: String,
    pub channel_name: String,
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub subtype: Option<String>,
    pub text: String,
    pub is_agent: bool,
}

impl Message {
    pub fn validate(&self) -> Result<(), DomainError> {
        let required = [
            ("id", self.id.0.as_str()),
            ("user_id", self.user_id.0.as_str()),
            ("channel_id", self.channel_id.as_str()),
            ("channel_name", self.channel_name.as_str()),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DomainError::InvalidMessage(format!("`{field}` must not be empty")));
            }
        }

        Ok(())
    }

    pub fn is_user_message(&self) -> bool {
        self.kind == USER_MESSAGE_KIND && self.subtype.is_none()
    }

    /// True when the text opens by addressing someone (`<@U123> ...`).
    pub fn is_directed_mention(&self) -> bool {
        self.text.starts_with("<@")
    }
}
