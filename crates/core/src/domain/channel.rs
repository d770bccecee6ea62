use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::message::Message;

pub const CHANNELS_KEY: &str = "support_channels";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub last_agent_message_time: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl Channel {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), last_agent_message_time: DateTime::UNIX_EPOCH, messages: Vec::new() }
    }

    /// Agents answer in person, so their activity invalidates everything queued.
    pub fn record_agent_activity(&mut self, timestamp: DateTime<Utc>) {
        if timestamp > self.last_agent_message_time {
            self.last_agent_message_time = timestamp;
        }
        self.messages.clear();
    }

    pub fn is_idle(&self, now: DateTime<Utc>, retention: chrono::Duration) -> bool {
        self.messages.is_empty() && self.last_agent_message_time <= now - retention
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelCollection {
    pub channels: Vec<Channel>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodeReport {
    pub skipped_channels: usize,
    pub skipped_messages: usize,
}

impl DecodeReport {
    pub fn is_clean(&self) -> bool {
        self.skipped_channels == 0 && self.skipped_messages == 0
    }
}

#[derive(Deserialize)]
struct StoredChannel {
    id: String,
    #[serde(default = "epoch")]
    last_agent_message_time: DateTime<Utc>,
    #[serde(default)]
    messages: Vec<Value>,
}

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

impl ChannelCollection {
    /// Decodes the persisted collection entry by entry.
    ///
    /// Entries that do not parse are skipped and counted instead of failing the
    /// whole load, so one bad record cannot wedge the queue.
    pub fn decode(value: Option<Value>) -> (Self, DecodeReport) {
        let mut report = DecodeReport::default();
        let entries = match value {
            Some(Value::Array(entries)) => entries,
            Some(Value::Null) | None => return (Self::default(), report),
            Some(_) => {
                report.skipped_channels += 1;
                return (Self::default(), report);
            }
        };

        let mut channels = Vec::with_capacity(entries.len());
        for entry in entries {
            let Ok(stored) = serde_json::from_value::<StoredChannel>(entry) else {
                report.skipped_channels += 1;
                continue;
            };

            let mut messages = Vec::with_capacity(stored.messages.len());
            for raw in stored.messages {
                match serde_json::from_value::<Message>(raw) {
                    Ok(message) if message.validate().is_ok() => messages.push(message),
                    _ => report.skipped_messages += 1,
                }
            }

            channels.push(Channel {
                id: stored.id,
                last_agent_message_time: stored.last_agent_message_time,
                messages,
            });
        }

        (Self { channels }, report)
    }

    pub fn encode(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(&self.channels)
    }

    pub fn find_or_create(&mut self, channel_id: &str) -> &mut Channel {
        let index = match self.channels.iter().position(|channel| channel.id == channel_id) {
            Some(index) => index,
            None => {
                self.channels.push(Channel::new(channel_id));
                self.channels.len() - 1
            }
        };
        &mut self.channels[index]
    }

    pub fn upsert(&mut self, channel: Channel) {
        match self.channels.iter_mut().find(|existing| existing.id == channel.id) {
            Some(existing) => *existing = channel,
            None => self.channels.push(channel),
        }
    }

    pub fn get(&self, channel_id: &str) -> Option<&Channel> {
        self.channels.iter().find(|channel| channel.id == channel_id)
    }

    pub fn queued_messages(&self) -> usize {
        self.channels.iter().map(|channel| channel.messages.len()).sum()
    }

    /// Removes channels with nothing queued and no agent activity inside `retention`.
    pub fn prune_idle(&mut self, now: DateTime<Utc>, retention: chrono::Duration) -> usize {
        let before = self.channels.len();
        self.channels.retain(|channel| !channel.is_idle(now, retention));
        before - self.channels.len()
    }
}
