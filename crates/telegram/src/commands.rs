use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, info};

use crate::clock::Clock;
use crate::events::Sender;
use crate::messages::{self, OutboundMessage};

pub const STATUS_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandPayload {
    pub command: String,
    /// Lowercased `@bot_name` suffix, when the command names a bot.
    pub target: Option<String>,
    pub chat_id: i64,
    pub sender: Option<Sender>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Help,
    Status,
    Unknown { command: String },
}

/// The bot's own username, learned from `getMe` each time the transport connects.
#[derive(Clone, Debug, Default)]
pub struct BotIdentity {
    username: Arc<RwLock<Option<String>>>,
}

impl BotIdentity {
    pub fn record_username(&self, username: &str) {
        *self.username.write().unwrap_or_else(PoisonError::into_inner) =
            Some(username.to_ascii_lowercase());
    }

    pub fn username(&self) -> Option<String> {
        self.username.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// A command without a suffix is addressed to every bot in the chat. Until the
    /// username is known a suffix cannot be checked, so the command is accepted.
    pub fn is_addressed(&self, target: Option<&str>) -> bool {
        let Some(target) = target else {
            return true;
        };

        self.username().map_or(true, |own| own.eq_ignore_ascii_case(target))
    }
}

/// Splits `/cmd@bot_name rest` into (`cmd`, `Some(bot_name)`), both lowercased.
/// Returns `None` for non-command text.
pub fn parse_command(text: &str) -> Option<(String, Option<String>)> {
    let rest = text.trim_start().strip_prefix('/')?;
    let head = rest.split(char::is_whitespace).next().unwrap_or(rest);
    let (command, target) = match head.split_once('@') {
        Some((command, bot)) => (command, Some(bot.to_ascii_lowercase())),
        None => (head, None),
    };
    if command.is_empty() {
        return None;
    }

    Some((command.to_ascii_lowercase(), target))
}

pub fn classify_command(command: &str) -> BotCommand {
    match command {
        "start" => BotCommand::Start,
        "help" => BotCommand::Help,
        "status" => BotCommand::Status,
        other => BotCommand::Unknown { command: other.to_owned() },
    }
}

pub struct CommandRouter {
    clock: Arc<dyn Clock>,
}

impl CommandRouter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Unknown commands get no reply.
    pub fn route(&self, payload: &CommandPayload) -> Option<OutboundMessage> {
        let user_id = payload.sender.as_ref().map(|sender| sender.user_id);

        match classify_command(&payload.command) {
            BotCommand::Start => {
                info!(
                    event_name = "command.start",
                    user_id = user_id.unwrap_or_default(),
                    chat_id = payload.chat_id,
                    "user started the bot"
                );
                Some(messages::welcome_message(payload.chat_id, Sender::display_name(&payload.sender)))
            }
            BotCommand::Help => Some(messages::help_message(payload.chat_id)),
            BotCommand::Status => {
                let checked_at = self.clock.now().format(STATUS_TIME_FORMAT).to_string();
                Some(messages::status_message(payload.chat_id, user_id, &checked_at))
            }
            BotCommand::Unknown { command } => {
                debug!(
                    event_name = "command.unknown",
                    chat_id = payload.chat_id,
                    command = %command,
                    "ignoring unknown command"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{FixedOffset, TimeZone};

    use super::{
        classify_command, parse_command, BotCommand, BotIdentity, CommandPayload, CommandRouter,
    };
    use crate::clock::FixedClock;
    use crate::events::Sender;

    fn router() -> CommandRouter {
        let offset = FixedOffset::east_opt(0).expect("offset");
        let now = offset.with_ymd_and_hms(2026, 10, 17, 8, 30, 5).single().expect("timestamp");
        CommandRouter::new(Arc::new(FixedClock(now)))
    }

    fn payload(command: &str) -> CommandPayload {
        CommandPayload {
            command: command.to_owned(),
            target: None,
            chat_id: 99,
            sender: Some(Sender { user_id: 7, first_name: "Sam".to_owned() }),
        }
    }

    #[test]
    fn parses_command_with_bot_suffix_and_arguments() {
        assert_eq!(
            parse_command("/Status@Autoreply_Bot now please"),
            Some(("status".to_owned(), Some("autoreply_bot".to_owned())))
        );
        assert_eq!(parse_command("/help"), Some(("help".to_owned(), None)));
        assert_eq!(parse_command("/help me"), Some(("help".to_owned(), None)));
        assert_eq!(parse_command("hello /help"), None);
        assert_eq!(parse_command("/"), None);
        assert_eq!(parse_command("/@autoreply_bot"), None);
    }

    #[test]
    fn classifies_known_and_unknown_commands() {
        assert_eq!(classify_command("start"), BotCommand::Start);
        assert_eq!(classify_command("help"), BotCommand::Help);
        assert_eq!(classify_command("status"), BotCommand::Status);
        assert_eq!(
            classify_command("weather"),
            BotCommand::Unknown { command: "weather".to_owned() }
        );
    }

    #[test]
    fn start_greets_sender_by_first_name() {
        let message = router().route(&payload("start")).expect("start reply");

        assert!(message.text.starts_with("👋 Hello Sam!"));
        assert_eq!(message.chat_id, 99);
    }

    #[test]
    fn status_reports_clock_time_and_ids() {
        let message = router().route(&payload("status")).expect("status reply");

        assert!(message.text.contains("2026-10-17 08:30:05"));
        assert!(message.text.contains("`7`"));
        assert!(message.text.contains("`99`"));
    }

    #[test]
    fn unknown_command_gets_no_reply() {
        assert_eq!(router().route(&payload("weather")), None);
    }

    #[test]
    fn identity_accepts_own_suffix_and_rejects_other_bots() {
        let identity = BotIdentity::default();
        assert!(identity.is_addressed(Some("other_bot")));

        identity.record_username("Autoreply_Bot");

        assert!(identity.is_addressed(None));
        assert!(identity.is_addressed(Some("autoreply_bot")));
        assert!(!identity.is_addressed(Some("other_bot")));
        assert_eq!(identity.username().as_deref(), Some("autoreply_bot"));
    }
}
