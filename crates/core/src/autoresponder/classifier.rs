use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AutoresponderConfig;
use crate::domain::channel::Channel;
use crate::domain::message::Message;

/// How far past `now` a message may be stamped before it is treated as malformed.
pub const MAX_CLOCK_SKEW_SECS: i64 = 300;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Malformed,
    UnmonitoredRoom,
    NotUserMessage,
    AgentMessage,
    OfficeHours,
    DirectedMention,
    AgentConversation,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::UnmonitoredRoom => "unmonitored_room",
            Self::NotUserMessage => "not_user_message",
            Self::AgentMessage => "agent_message",
            Self::OfficeHours => "office_hours",
            Self::DirectedMention => "directed_mention",
            Self::AgentConversation => "agent_conversation",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnqueueVerdict {
    Enqueue,
    Skip(SkipReason),
}

impl EnqueueVerdict {
    pub fn is_enqueue(self) -> bool {
        matches!(self, Self::Enqueue)
    }
}

/// Decides whether `message` should join `channel`'s queue.
///
/// Agent messages are never queued; they advance the channel's agent clock and
/// clear everything pending. That side effect is the only mutation performed here.
pub fn classify(
    channel: &mut Channel,
    message: &Message,
    now: DateTime<Utc>,
    policy: &AutoresponderConfig,
) -> EnqueueVerdict {
    if message.validate().is_err() {
        return EnqueueVerdict::Skip(SkipReason::Malformed);
    }

    // A far-future stamp would never age past the reply timeout.
    match now.checked_add_signed(Duration::seconds(MAX_CLOCK_SKEW_SECS)) {
        Some(latest) if message.timestamp <= latest => {}
        _ => return EnqueueVerdict::Skip(SkipReason::Malformed),
    }

    if !policy.monitors(&message.channel_name) {
        return EnqueueVerdict::Skip(SkipReason::UnmonitoredRoom);
    }

    if !message.is_user_message() {
        return EnqueueVerdict::Skip(SkipReason::NotUserMessage);
    }

    if message.is_agent {
        channel.record_agent_activity(message.timestamp);
        return EnqueueVerdict::Skip(SkipReason::AgentMessage);
    }

    if policy.office_hours.is_open(now) {
        return EnqueueVerdict::Skip(SkipReason::OfficeHours);
    }

    if message.is_directed_mention() {
        return EnqueueVerdict::Skip(SkipReason::DirectedMention);
    }

    match message.timestamp.checked_sub_signed(policy.conversation_timeout()) {
        None => EnqueueVerdict::Skip(SkipReason::Malformed),
        Some(cutoff) if cutoff >= channel.last_agent_message_time => EnqueueVerdict::Enqueue,
        Some(_) => EnqueueVerdict::Skip(SkipReason::AgentConversation),
    }
}

pub fn should_enqueue(
    channel: &mut Channel,
    message: &Message,
    now: DateTime<Utc>,
    policy: &AutoresponderConfig,
) -> bool {
    classify(channel, message, now, policy).is_enqueue()
}
