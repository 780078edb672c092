use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    Markdown,
}

/// Body of a Bot API `sendMessage` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<ParseMode>,
}

impl OutboundMessage {
    pub fn plain(chat_id: i64, text: impl Into<String>) -> Self {
        Self { chat_id, text: text.into(), parse_mode: None }
    }
}

pub struct MessageBuilder {
    chat_id: i64,
    lines: Vec<String>,
    parse_mode: Option<ParseMode>,
}

impl MessageBuilder {
    pub fn new(chat_id: i64) -> Self {
        Self { chat_id, lines: Vec::new(), parse_mode: None }
    }

    pub fn line(mut self, text: impl Into<String>) -> Self {
        self.lines.push(text.into());
        self
    }

    pub fn blank(self) -> Self {
        self.line("")
    }

    pub fn markdown(mut self) -> Self {
        self.parse_mode = Some(ParseMode::Markdown);
        self
    }

    pub fn build(self) -> OutboundMessage {
        OutboundMessage { chat_id: self.chat_id, text: self.lines.join("\n"), parse_mode: self.parse_mode }
    }
}

const COMMAND_LIST: [&str; 3] =
    ["/start - Start the bot", "/help - Show help message", "/status - Check bot status"];

pub fn welcome_message(chat_id: i64, first_name: &str) -> OutboundMessage {
    COMMAND_LIST
        .iter()
        .fold(
            MessageBuilder::new(chat_id)
                .line(format!("👋 Hello {first_name}!"))
                .blank()
                .line("I'm an autoresponder bot. Send me any message and I'll respond automatically.")
                .blank()
                .line("Commands:"),
            |builder, command| builder.line(*command),
        )
        .build()
}

pub fn help_message(chat_id: i64) -> OutboundMessage {
    MessageBuilder::new(chat_id)
        .markdown()
        .line("🤖 *Autoresponder Bot Help*")
        .blank()
        .line("This bot automatically responds to your messages based on keywords.")
        .blank()
        .line("*Available Commands:*")
        .line("/start - Start the bot")
        .line("/help - Show this help message")
        .line("/status - Check if bot is active")
        .blank()
        .line("Just send me a message and I'll respond!")
        .build()
}

pub fn status_message(chat_id: i64, user_id: Option<i64>, checked_at: &str) -> OutboundMessage {
    let user = user_id.map_or_else(|| "unknown".to_owned(), |id| id.to_string());
    MessageBuilder::new(chat_id)
        .markdown()
        .line("✅ *Bot Status: Active*")
        .blank()
        .line(format!("⏰ Current Time: {checked_at}"))
        .line(format!("👤 Your ID: `{user}`"))
        .line(format!("💬 Chat ID: `{chat_id}`"))
        .build()
}
