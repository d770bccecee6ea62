use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::message::UserId;

pub const COOLDOWN_KEY_PREFIX: &str = "user_message_";

/// Store key holding the time of the last automated reply sent to `user_id`.
pub fn cooldown_key(user_id: &UserId) -> String {
    format!("{COOLDOWN_KEY_PREFIX}{}", user_id.0)
}

pub fn encode_last_autoresponse(sent_at: DateTime<Utc>) -> Value {
    Value::String(sent_at.to_rfc3339())
}

/// `None` when the stored value is not an RFC 3339 timestamp.
pub fn decode_last_autoresponse(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?;
    DateTime::parse_from_rfc3339(raw).ok().map(|parsed| parsed.with_timezone(&Utc))
}
