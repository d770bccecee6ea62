use chrono::{DateTime, Utc};
use thiserror::Error;

use deskbot_core::domain::message::{Message, MessageId, UserId, USER_MESSAGE_KIND};
use deskbot_core::errors::DomainError;

use crate::events::MessageEvent;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("message event is missing `{0}`")]
    MissingField(&'static str),
    #[error("`{0}` is not a slack timestamp")]
    InvalidTimestamp(String),
    #[error(transparent)]
    Invalid(#[from] DomainError),
}

/// Parses a Slack `ts` such as `1772481600.000100` (seconds, then microseconds).
pub fn parse_ts(ts: &str) -> Result<DateTime<Utc>, NormalizeError> {
    let invalid = || NormalizeError::InvalidTimestamp(ts.to_owned());
    let (secs, fraction) = ts.trim().split_once('.').unwrap_or((ts.trim(), ""));

    // Unsigned digits only; Slack never sends pre-epoch stamps.
    if !secs.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(invalid());
    }
    let secs = secs.parse::<i64>().map_err(|_| invalid())?;
    if fraction.len() > 9 || !fraction.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(invalid());
    }
    let nanos = if fraction.is_empty() {
        0
    } else {
        format!("{fraction:0<9}").parse::<u32>().map_err(|_| invalid())?
    };

    DateTime::from_timestamp(secs, nanos).ok_or_else(invalid)
}

/// Agents are identified by their company email domain (`@example.com`).
pub fn is_agent_email(email: Option<&str>, company_email_domain: &str) -> bool {
    let domain = company_email_domain.trim().trim_start_matches('@').to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }

    email.is_some_and(|email| email.trim().to_ascii_lowercase().ends_with(&format!("@{domain}")))
}

pub fn to_queue_message(
    event: &MessageEvent,
    company_email_domain: &str,
) -> Result<Message, NormalizeError> {
    let channel_name =
        event.channel_name.clone().ok_or(NormalizeError::MissingField("channel_name"))?;

    let message = Message {
        id: MessageId(event.ts.clone()),
        user_id: UserId(event.user_id.clone()),
        email_address: event.user_email.clone(),
        channel_id: event.channel_id.clone(),
        channel_name,
        timestamp: parse_ts(&event.ts)?,
        kind: USER_MESSAGE_KIND.to_owned(),
        subtype: event.subtype.clone(),
        text: event.text.clone(),
        is_agent: is_agent_email(event.user_email.as_deref(), company_email_domain),
    };
    message.validate()?;

    Ok(message)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{is_agent_email, parse_ts, to_queue_message, NormalizeError};
    use crate::events::MessageEvent;

    fn event(ts: &str, email: Option<&str>) -> MessageEvent {
        MessageEvent {
            channel_id: "C1".to_owned(),
            channel_name: Some("general".to_owned()),
            user_id: "U1".to_owned(),
            user_email: email.map(str::to_owned),
            ts: ts.to_owned(),
            text: "help please".to_owned(),
            subtype: None,
        }
    }

    #[test]
    fn slack_ts_keeps_microseconds() {
        let parsed = parse_ts("1772481600.000100").expect("ts");
        assert_eq!(parsed, Utc.timestamp_opt(1_772_481_600, 100_000).unwrap());
        assert_eq!(parse_ts("1772481600").expect("ts"), Utc.timestamp_opt(1_772_481_600, 0).unwrap());
    }

    #[test]
    fn malformed_ts_fails_closed() {
        for raw in
            ["", "abc", "1772481600.12x", "1772481600.1234567890", "-1", "-0.5", "+5", "-8334601228800"]
        {
            assert!(matches!(parse_ts(raw), Err(NormalizeError::InvalidTimestamp(_))), "{raw}");
        }
    }

    #[test]
    fn agent_detection_matches_company_domain_only() {
        assert!(is_agent_email(Some("Jane@Example.com"), "@example.com"));
        assert!(is_agent_email(Some("jane@example.com"), "example.com"));
        assert!(!is_agent_email(Some("jane@notexample.com"), "@example.com"));
        assert!(!is_agent_email(Some("jane@example.com.evil.io"), "@example.com"));
        assert!(!is_agent_email(None, "@example.com"));
        assert!(!is_agent_email(Some("jane@example.com"), ""));
    }

    #[test]
    fn message_event_becomes_validated_queue_message() {
        let message =
            to_queue_message(&event("1772481600.000100", Some("agent@example.com")), "@example.com")
                .expect("normalize");

        assert_eq!(message.id.0, "1772481600.000100");
        assert_eq!(message.channel_name, "general");
        assert_eq!(message.kind, "message");
        assert!(message.is_agent);
    }

    #[test]
    fn missing_room_name_or_user_is_rejected() {
        let mut no_room = event("1772481600.000100", None);
        no_room.channel_name = None;
        assert_eq!(
            to_queue_message(&no_room, "@example.com"),
            Err(NormalizeError::MissingField("channel_name"))
        );

        let mut no_user = event("1772481600.000100", None);
        no_user.user_id = String::new();
        assert!(matches!(
            to_queue_message(&no_user, "@example.com"),
            Err(NormalizeError::Invalid(_))
        ));
    }
}
