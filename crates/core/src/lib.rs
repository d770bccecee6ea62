pub mod autoresponder;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ports;

pub use autoresponder::{
    classify, decide_reply, should_enqueue, DeferReason, DropReason, EnqueueVerdict,
    ReplyDecision, SkipReason,
};
pub use config::{AppConfig, AutoresponderConfig, ConfigError, LoadOptions, WelcomeConfig};
pub use domain::channel::{Channel, ChannelCollection, DecodeReport, CHANNELS_KEY};
pub use domain::cooldown::{cooldown_key, COOLDOWN_KEY_PREFIX};
pub use domain::message::{Message, MessageId, UserId};
pub use domain::office_hours::{DailyWindow, OfficeHours};
pub use errors::{ApplicationError, DomainError, SendError, StoreError};
pub use ports::{MessageSender, StateStore};
