use async_trait::async_trait;
use tracing::{info, warn};

use deskbot_core::config::{SlackConfig, WelcomeConfig};

use crate::events::{EventContext, EventHandlerError, HandlerResult, MemberJoinedEvent, WelcomeService};
use crate::web::{ChatApi, PostMessage};

/// Greets users joining a welcome room with a direct message.
pub struct WelcomeResponder<C> {
    api: C,
    welcome: WelcomeConfig,
    support_email: String,
    username: String,
    icon_url: Option<String>,
}

impl<C> WelcomeResponder<C>
where
    C: ChatApi,
{
    pub fn new(api: C, welcome: WelcomeConfig, slack: &SlackConfig, support_email: &str) -> Self {
        Self {
            api,
            welcome,
            support_email: support_email.to_owned(),
            username: slack.username.clone(),
            icon_url: slack.icon_url.clone(),
        }
    }

    fn greets(&self, event: &MemberJoinedEvent) -> bool {
        self.welcome.enabled
            && event
                .channel_name
                .as_deref()
                .is_some_and(|room| self.welcome.rooms.iter().any(|candidate| candidate == room))
    }

    fn render(&self, user_id: &str) -> String {
        self.welcome.message.replace("{user}", user_id).replace("{support_email}", &self.support_email)
    }
}

#[async_trait]
impl<C> WelcomeService for WelcomeResponder<C>
where
    C: ChatApi,
{
    async fn welcome(
        &self,
        event: &MemberJoinedEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        if !self.greets(event) {
            return Ok(HandlerResult::Ignored);
        }

        // Posting to a user id opens a DM with that user.
        let message = PostMessage {
            channel: event.user_id.clone(),
            text: self.render(&event.user_id),
            username: Some(self.username.clone()).filter(|name| !name.is_empty()),
            icon_url: self.icon_url.clone(),
        };

        match self.api.post_message(&message).await {
            Ok(()) => {
                info!(
                    event_name = "welcome.sent",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %event.channel_id,
                    user_id = %event.user_id,
                    "welcome message sent"
                );
                Ok(HandlerResult::Processed)
            }
            Err(error) => {
                warn!(
                    event_name = "welcome.failed",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %event.channel_id,
                    user_id = %event.user_id,
                    error = %error,
                    "welcome message could not be sent"
                );
                Err(EventHandlerError::Welcome(error.to_string()))
            }
        }
    }
}
