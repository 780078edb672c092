//! Telegram Integration - long-polling bot interface
//!
//! This crate provides the Telegram interface for autoreply:
//! - **Bot API** (`api`) - `getMe` / `getUpdates` / `sendMessage` over HTTPS
//! - **Polling** (`polling`) - update loop with reconnection logic
//! - **Commands** (`commands`) - `/start`, `/help`, `/status`, addressed to this bot
//! - **Events** (`events`) - update classification and keyword auto-replies
//! - **Messages** (`messages`) - outbound message builders
//!
//! # Getting Started
//!
//! 1. Create a bot with @BotFather and copy its token
//! 2. Set `AUTOREPLY_TELEGRAM_BOT_TOKEN`
//! 3. Point `AUTOREPLY_RESPONSES_PATH` at a rules file (defaults to `responses.json`)
//!
//! # Architecture
//!
//! ```text
//! getUpdates → PollingRunner → EventDispatcher → Handlers → ResponseResolver
//!                   ↓
//!              sendMessage ← OutboundMessage
//! ```
//!
//! # Key Types
//!
//! - `PollingRunner` - update loop with reconnection logic
//! - `EventDispatcher` - Routes updates to the handler for their event type
//! - `AutoReplyService` - Answers plain text from the active rule set
//! - `BotApiTransport` - reqwest-backed `UpdateTransport`

pub mod api;
pub mod clock;
pub mod commands;
pub mod events;
pub mod messages;
pub mod polling;

pub use api::{BotApiSettings, BotApiTransport};
pub use clock::{Clock, FixedClock, SystemClock};
pub use commands::BotIdentity;
pub use events::{default_dispatcher, AutoReplyService, EventDispatcher};
pub use polling::{PollingRunner, ReconnectPolicy, UpdateTransport};
