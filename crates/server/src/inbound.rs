use std::sync::Arc;

use async_trait::async_trait;
use deskbot_autoresponder::AutoresponderEngine;
use deskbot_core::ports::{MessageSender, StateStore};
use deskbot_slack::events::{
    EventContext, EventHandlerError, HandlerResult, InboundMessageService, MessageEvent,
};
use deskbot_slack::normalize::to_queue_message;
use tracing::debug;

/// Feeds normalized channel messages into the autoresponder queue.
pub struct EngineInbound<S, M> {
    engine: Arc<AutoresponderEngine<S, M>>,
    company_email_domain: String,
}

impl<S, M> EngineInbound<S, M> {
    pub fn new(engine: Arc<AutoresponderEngine<S, M>>, company_email_domain: String) -> Self {
        Self { engine, company_email_domain }
    }
}

#[async_trait]
impl<S, M> InboundMessageService for EngineInbound<S, M>
where
    S: StateStore + 'static,
    M: MessageSender + 'static,
{
    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        // Bot posts and edits arrive without a user; they are never queued.
        let message = match to_queue_message(event, &self.company_email_domain) {
            Ok(message) => message,
            Err(error) => {
                debug!(
                    event_name = "ingress.message.unqueueable",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %event.channel_id,
                    message_id = %event.ts,
                    error = %error,
                    "message event could not be normalized"
                );
                return Ok(HandlerResult::Ignored);
            }
        };

        let outcome = self
            .engine
            .enqueue(message)
            .await
            .map_err(|error| EventHandlerError::Message(error.to_string()))?;

        Ok(if outcome.queued { HandlerResult::Processed } else { HandlerResult::Ignored })
    }
}
