use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::normalize::NormalizeError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlackEnvelope {
    pub envelope_id: String,
    pub event: SlackEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlackEvent {
    Message(MessageEvent),
    MemberJoinedChannel(MemberJoinedEvent),
    Unsupported { event_type: String },
}

impl SlackEvent {
    pub fn event_type(&self) -> SlackEventType {
        match self {
            Self::Message(_) => SlackEventType::Message,
            Self::MemberJoinedChannel(_) => SlackEventType::MemberJoinedChannel,
            Self::Unsupported { .. } => SlackEventType::Unsupported,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlackEventType {
    Message,
    MemberJoinedChannel,
    Unsupported,
}

/// A channel message as delivered by the transport.
///
/// The transport resolves `channel_name` and `user_email` before dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub channel_id: String,
    pub channel_name: Option<String>,
    pub user_id: String,
    pub user_email: Option<String>,
    pub ts: String,
    pub text: String,
    pub subtype: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberJoinedEvent {
    pub channel_id: String,
    pub channel_name: Option<String>,
    pub user_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error("message handler failure: {0}")]
    Message(String),
    #[error("welcome handler failure: {0}")]
    Welcome(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> SlackEventType;
    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<SlackEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub fn default_dispatcher() -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(MessageHandler::new(NoopInboundMessageService));
    dispatcher.register(MemberJoinedHandler::new(NoopWelcomeService));
    dispatcher
}

#[async_trait]
pub trait InboundMessageService: Send + Sync {
    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

pub struct MessageHandler<S> {
    service: S,
}

impl<S> MessageHandler<S>
where
    S: InboundMessageService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for MessageHandler<S>
where
    S: InboundMessageService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::Message
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.handle_message(event, ctx).await
    }
}

pub struct NoopInboundMessageService;

#[async_trait]
impl InboundMessageService for NoopInboundMessageService {
    async fn handle_message(
        &self,
        _event: &MessageEvent,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        Ok(HandlerResult::Ignored)
    }
}

#[async_trait]
pub trait WelcomeService: Send + Sync {
    async fn welcome(
        &self,
        event: &MemberJoinedEvent,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

pub struct MemberJoinedHandler<S> {
    service: S,
}

impl<S> MemberJoinedHandler<S>
where
    S: WelcomeService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for MemberJoinedHandler<S>
where
    S: WelcomeService + 'static,
{
    fn event_type(&self) -> SlackEventType {
        SlackEventType::MemberJoinedChannel
    }

    async fn handle(
        &self,
        envelope: &SlackEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let SlackEvent::MemberJoinedChannel(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        self.service.welcome(event, ctx).await
    }
}

pub struct NoopWelcomeService;

#[async_trait]
impl WelcomeService for NoopWelcomeService {
    async fn welcome(
        &self,
        _event: &MemberJoinedEvent,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        Ok(HandlerResult::Ignored)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::{
        default_dispatcher, EventContext, EventDispatcher, EventHandlerError, HandlerResult,
        InboundMessageService, MemberJoinedEvent, MessageEvent, MessageHandler, SlackEnvelope,
        SlackEvent,
    };

    #[derive(Default)]
    struct RecordingService {
        seen: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl InboundMessageService for Arc<RecordingService> {
        async fn handle_message(
            &self,
            event: &MessageEvent,
            ctx: &EventContext,
        ) -> Result<HandlerResult, EventHandlerError> {
            self.seen.lock().await.push((event.ts.clone(), ctx.correlation_id.clone()));
            Ok(HandlerResult::Processed)
        }
    }

    fn message_envelope(envelope_id: &str) -> SlackEnvelope {
        SlackEnvelope {
            envelope_id: envelope_id.to_owned(),
            event: SlackEvent::Message(MessageEvent {
                channel_id: "C1".to_owned(),
                channel_name: Some("general".to_owned()),
                user_id: "U1".to_owned(),
                user_email: Some("user@customer.io".to_owned()),
                ts: "1772481600.000100".to_owned(),
                text: "help please".to_owned(),
                subtype: None,
            }),
        }
    }

    #[tokio::test]
    async fn dispatcher_routes_channel_messages_to_inbound_service() {
        let service = Arc::new(RecordingService::default());
        let mut dispatcher = EventDispatcher::new();
        dispatcher.register(MessageHandler::new(service.clone()));

        let context = EventContext { correlation_id: "env-1".to_owned() };
        let result =
            dispatcher.dispatch(&message_envelope("env-1"), &context).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Processed);
        assert_eq!(
            *service.seen.lock().await,
            vec![("1772481600.000100".to_owned(), "env-1".to_owned())]
        );
    }

    #[tokio::test]
    async fn dispatcher_returns_ignored_when_no_handler_registered() {
        let dispatcher = EventDispatcher::new();
        let envelope = SlackEnvelope {
            envelope_id: "env-2".to_owned(),
            event: SlackEvent::MemberJoinedChannel(MemberJoinedEvent {
                channel_id: "C1".to_owned(),
                channel_name: Some("general".to_owned()),
                user_id: "U2".to_owned(),
            }),
        };

        let result =
            dispatcher.dispatch(&envelope, &EventContext::default()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn default_dispatcher_accepts_events_without_side_effects() {
        let dispatcher = default_dispatcher();
        assert_eq!(dispatcher.handler_count(), 2);

        let result = dispatcher
            .dispatch(&message_envelope("env-3"), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }
}
