use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use autoreply_core::{resolve_with_selection, RenderContext, RuleSetHandle, Selection};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    clock::Clock,
    commands::{parse_command, BotIdentity, CommandPayload, CommandRouter},
    messages::OutboundMessage,
};

/// Display name used when an update carries no sender (e.g. anonymous channel posts).
pub const ANONYMOUS_DISPLAY_NAME: &str = "there";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub event: TelegramEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TelegramEvent {
    Command(CommandPayload),
    TextMessage(TextMessageEvent),
    Unsupported { kind: String },
}

impl TelegramEvent {
    /// Classifies a text message the way the Bot API marks commands: a leading `/`.
    pub fn from_text(chat_id: i64, sender: Option<Sender>, text: String) -> Self {
        match parse_command(&text) {
            Some((command, target)) => {
                Self::Command(CommandPayload { command, target, chat_id, sender })
            }
            None => Self::TextMessage(TextMessageEvent { chat_id, sender, text }),
        }
    }

    pub fn event_type(&self) -> TelegramEventType {
        match self {
            Self::Command(_) => TelegramEventType::Command,
            Self::TextMessage(_) => TelegramEventType::TextMessage,
            Self::Unsupported { .. } => TelegramEventType::Unsupported,
        }
    }

    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Self::Command(payload) => Some(payload.chat_id),
            Self::TextMessage(event) => Some(event.chat_id),
            Self::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TelegramEventType {
    Command,
    TextMessage,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    pub user_id: i64,
    pub first_name: String,
}

impl Sender {
    pub fn display_name(sender: &Option<Sender>) -> &str {
        sender
            .as_ref()
            .map(|sender| sender.first_name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or(ANONYMOUS_DISPLAY_NAME)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessageEvent {
    pub chat_id: i64,
    pub sender: Option<Sender>,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl EventContext {
    pub fn for_update(update_id: i64) -> Self {
        Self { correlation_id: format!("update-{update_id}") }
    }
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(OutboundMessage),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("text message handler failure: {0}")]
    TextMessage(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> TelegramEventType;
    async fn handle(
        &self,
        update: &TelegramUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<TelegramEventType, Arc<dyn EventHandler>>,
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
        update: &TelegramUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&update.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(update, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub fn default_dispatcher(
    rules: RuleSetHandle,
    clock: Arc<dyn Clock>,
    identity: BotIdentity,
) -> EventDispatcher {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(CommandHandler::new(CommandRouter::new(Arc::clone(&clock)), identity));
    dispatcher.register(TextMessageHandler::new(AutoReplyService::new(rules, clock)));
    dispatcher
}

/// Answers commands addressed to this bot; commands naming another bot are ignored.
pub struct CommandHandler {
    router: CommandRouter,
    identity: BotIdentity,
}

impl CommandHandler {
    pub fn new(router: CommandRouter, identity: BotIdentity) -> Self {
        Self { router, identity }
    }
}

#[async_trait]
impl EventHandler for CommandHandler {
    fn event_type(&self) -> TelegramEventType {
        TelegramEventType::Command
    }

    async fn handle(
        &self,
        update: &TelegramUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let TelegramEvent::Command(payload) = &update.event else {
            return Ok(HandlerResult::Ignored);
        };

        if !self.identity.is_addressed(payload.target.as_deref()) {
            debug!(
                event_name = "command.other_bot",
                correlation_id = %ctx.correlation_id,
                command = %payload.command,
                target = payload.target.as_deref().unwrap_or_default(),
                "command addressed to another bot"
            );
            return Ok(HandlerResult::Ignored);
        }

        Ok(self.router.route(payload).map_or(HandlerResult::Ignored, HandlerResult::Responded))
    }
}

#[async_trait]
pub trait TextMessageService: Send + Sync {
    async fn handle_text_message(
        &self,
        event: &TextMessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<OutboundMessage>, EventHandlerError>;
}

pub struct TextMessageHandler<S> {
    service: S,
}

impl<S> TextMessageHandler<S>
where
    S: TextMessageService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for TextMessageHandler<S>
where
    S: TextMessageService + 'static,
{
    fn event_type(&self) -> TelegramEventType {
        TelegramEventType::TextMessage
    }

    async fn handle(
        &self,
        update: &TelegramUpdate,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let TelegramEvent::TextMessage(event) = &update.event else {
            return Ok(HandlerResult::Ignored);
        };

        let message = self.service.handle_text_message(event, ctx).await?;
        Ok(match message {
            Some(message) => HandlerResult::Responded(message),
            None => HandlerResult::Processed,
        })
    }
}

/// Answers every text message from the currently published rule set.
pub struct AutoReplyService {
    rules: RuleSetHandle,
    clock: Arc<dyn Clock>,
}

impl AutoReplyService {
    pub fn new(rules: RuleSetHandle, clock: Arc<dyn Clock>) -> Self {
        Self { rules, clock }
    }
}

#[async_trait]
impl TextMessageService for AutoReplyService {
    async fn handle_text_message(
        &self,
        event: &TextMessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<OutboundMessage>, EventHandlerError> {
        let rule_set = self.rules.current();
        let context =
            RenderContext::at(Sender::display_name(&event.sender), &self.clock.now());

        let reply = resolve_with_selection(&event.text, &context, &rule_set);

        info!(
            event_name = "autoreply.message.answered",
            correlation_id = %ctx.correlation_id,
            chat_id = event.chat_id,
            user_id = event.sender.as_ref().map(|sender| sender.user_id).unwrap_or_default(),
            matched_rule = match reply.selection {
                Selection::Rule { index } => index as i64,
                Selection::Default => -1,
            },
            "auto-reply selected"
        );
        debug!(correlation_id = %ctx.correlation_id, text = %event.text, "inbound message text");

        Ok(Some(OutboundMessage::plain(event.chat_id, reply.text)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use autoreply_core::{Rule, RuleSet, RuleSetHandle};
    use chrono::{FixedOffset, TimeZone};

    use super::{
        default_dispatcher, EventContext, EventDispatcher, HandlerResult, Sender, TelegramEvent,
        TelegramUpdate,
    };
    use crate::clock::{Clock, FixedClock};
    use crate::commands::BotIdentity;

    fn clock() -> Arc<dyn Clock> {
        let offset = FixedOffset::east_opt(0).expect("offset");
        Arc::new(FixedClock(
            offset.with_ymd_and_hms(2026, 10, 17, 14, 5, 0).single().expect("timestamp"),
        ))
    }

    fn rules() -> RuleSetHandle {
        RuleSetHandle::new(RuleSet::new(
            vec![
                Rule::new(["hello", "hi"], "Hey {name}!"),
                Rule::new(["time"], "It is {time}, {name}."),
            ],
            "I received your message!",
        ))
    }

    fn sam() -> Option<Sender> {
        Some(Sender { user_id: 11, first_name: "Sam".to_owned() })
    }

    fn text_update(update_id: i64, text: &str, sender: Option<Sender>) -> TelegramUpdate {
        TelegramUpdate {
            update_id,
            event: TelegramEvent::from_text(500, sender, text.to_owned()),
        }
    }

    fn reply_text(result: HandlerResult) -> String {
        match result {
            HandlerResult::Responded(message) => message.text,
            other => panic!("expected a response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn text_message_is_answered_from_matching_rule() {
        let dispatcher = default_dispatcher(rules(), clock(), BotIdentity::default());

        let result = dispatcher
            .dispatch(&text_update(1, "Hi there", sam()), &EventContext::for_update(1))
            .await
            .expect("dispatch");

        assert_eq!(reply_text(result), "Hey Sam!");
    }

    #[tokio::test]
    async fn time_placeholder_uses_injected_clock() {
        let dispatcher = default_dispatcher(rules(), clock(), BotIdentity::default());

        let result = dispatcher
            .dispatch(&text_update(2, "what TIME is it", sam()), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(reply_text(result), "It is 14:05, Sam.");
    }

    #[tokio::test]
    async fn unmatched_text_gets_default_reply() {
        let dispatcher = default_dispatcher(rules(), clock(), BotIdentity::default());

        let result = dispatcher
            .dispatch(&text_update(3, "good morning", sam()), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(reply_text(result), "I received your message!");
    }

    #[tokio::test]
    async fn anonymous_sender_is_greeted_generically() {
        let dispatcher = default_dispatcher(rules(), clock(), BotIdentity::default());

        let result = dispatcher
            .dispatch(&text_update(4, "hello", None), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(reply_text(result), "Hey there!");
    }

    #[tokio::test]
    async fn reload_is_visible_to_next_message() {
        let handle = rules();
        let dispatcher = default_dispatcher(handle.clone(), clock(), BotIdentity::default());

        handle.replace(RuleSet::new(Vec::new(), "Rules were reloaded"));
        let result = dispatcher
            .dispatch(&text_update(5, "hello", sam()), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(reply_text(result), "Rules were reloaded");
    }

    #[tokio::test]
    async fn commands_are_routed_to_command_handler() {
        let dispatcher = default_dispatcher(rules(), clock(), BotIdentity::default());

        let result = dispatcher
            .dispatch(&text_update(6, "/start", sam()), &EventContext::default())
            .await
            .expect("dispatch");

        assert!(reply_text(result).starts_with("👋 Hello Sam!"));
    }

    fn dispatcher_for(username: &str) -> EventDispatcher {
        let identity = BotIdentity::default();
        identity.record_username(username);
        default_dispatcher(rules(), clock(), identity)
    }

    #[tokio::test]
    async fn command_for_another_bot_is_ignored() {
        let dispatcher = dispatcher_for("autoreply_bot");

        let result = dispatcher
            .dispatch(&text_update(9, "/start@other_bot", sam()), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn command_for_this_bot_is_answered_regardless_of_case() {
        let dispatcher = dispatcher_for("autoreply_bot");

        let result = dispatcher
            .dispatch(&text_update(10, "/help@AutoReply_Bot", sam()), &EventContext::default())
            .await
            .expect("dispatch");

        assert!(reply_text(result).contains("Autoresponder Bot Help"));
    }

    #[tokio::test]
    async fn unknown_command_is_ignored() {
        let dispatcher = dispatcher_for("autoreply_bot");

        let result = dispatcher
            .dispatch(&text_update(11, "/weather", sam()), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn matching_rule_without_response_answers_with_default() {
        let handle = RuleSetHandle::new(RuleSet::new(
            vec![Rule::new(["hi"], ""), Rule::new(["hi"], "Second")],
            "D",
        ));
        let dispatcher = default_dispatcher(handle, clock(), BotIdentity::default());

        let result = dispatcher
            .dispatch(&text_update(12, "hi", sam()), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(reply_text(result), "D");
    }

    #[tokio::test]
    async fn dispatcher_returns_ignored_when_no_handler_registered() {
        let dispatcher = EventDispatcher::new();

        let result = dispatcher
            .dispatch(&text_update(7, "hello", sam()), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn unsupported_updates_are_ignored() {
        let dispatcher = default_dispatcher(rules(), clock(), BotIdentity::default());
        let update = TelegramUpdate {
            update_id: 8,
            event: TelegramEvent::Unsupported { kind: "edited_message".to_owned() },
        };

        let result = dispatcher.dispatch(&update, &EventContext::default()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[test]
    fn default_dispatcher_registers_handlers() {
        assert_eq!(default_dispatcher(rules(), clock(), BotIdentity::default()).handler_count(), 2);
    }
}
