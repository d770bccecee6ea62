use async_trait::async_trait;

use deskbot_core::config::{AutoresponderConfig, SlackConfig};
use deskbot_core::domain::message::UserId;
use deskbot_core::errors::SendError;
use deskbot_core::ports::MessageSender;

use crate::web::{ChatApi, PostMessage};

/// Posts the configured autoresponse into the room, addressed to the user.
pub struct SlackAutoresponseSender<C> {
    api: C,
    policy: AutoresponderConfig,
    username: String,
    icon_url: Option<String>,
}

impl<C> SlackAutoresponseSender<C>
where
    C: ChatApi,
{
    pub fn new(api: C, slack: &SlackConfig, policy: AutoresponderConfig) -> Self {
        Self { api, policy, username: slack.username.clone(), icon_url: slack.icon_url.clone() }
    }

    pub fn compose(&self, channel_id: &str, user_id: &UserId) -> PostMessage {
        PostMessage {
            channel: channel_id.to_owned(),
            text: self.policy.render_message(&user_id.0),
            username: Some(self.username.clone()).filter(|name| !name.is_empty()),
            icon_url: self.icon_url.clone(),
        }
    }
}

#[async_trait]
impl<C> MessageSender for SlackAutoresponseSender<C>
where
    C: ChatApi,
{
    async fn send(&self, channel_id: &str, user_id: &UserId) -> Result<(), SendError> {
        self.api.post_message(&self.compose(channel_id, user_id)).await.map_err(SendError::from)
    }
}
