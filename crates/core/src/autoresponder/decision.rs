use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AutoresponderConfig;
use crate::domain::channel::Channel;
use crate::domain::message::Message;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeferReason {
    TooYoung,
    MinimumReplyWindow,
    AgentRecentlyActive,
    /// The user's cooldown record could not be read this tick.
    CooldownUnknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    UserCooldown,
}

/// Outcome for one queued message on one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyDecision {
    Send,
    Drop(DropReason),
    /// Keep the message queued and look again next tick.
    Defer(DeferReason),
}

impl ReplyDecision {
    pub fn label(self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Drop(DropReason::UserCooldown) => "drop_user_cooldown",
            Self::Defer(DeferReason::TooYoung) => "defer_too_young",
            Self::Defer(DeferReason::MinimumReplyWindow) => "defer_minimum_reply_window",
            Self::Defer(DeferReason::AgentRecentlyActive) => "defer_agent_recently_active",
            Self::Defer(DeferReason::CooldownUnknown) => "defer_cooldown_unknown",
        }
    }
}

/// Timing guards run before the cooldown check so that a deferred message
/// never spends the user's cooldown slot.
pub fn decide_reply(
    channel: &Channel,
    message: &Message,
    now: DateTime<Utc>,
    last_autoresponse: Option<DateTime<Utc>>,
    policy: &AutoresponderConfig,
) -> ReplyDecision {
    if message.timestamp > now - policy.timeout() {
        return ReplyDecision::Defer(DeferReason::TooYoung);
    }

    if message.timestamp > now - policy.minimum_reply_timeout() {
        return ReplyDecision::Defer(DeferReason::MinimumReplyWindow);
    }

    if now - policy.agent_wait_timeout() < channel.last_agent_message_time {
        return ReplyDecision::Defer(DeferReason::AgentRecentlyActive);
    }

    if last_autoresponse.is_some_and(|sent_at| sent_at > now - policy.user_limit_timeout()) {
        return ReplyDecision::Drop(DropReason::UserCooldown);
    }

    ReplyDecision::Send
}
