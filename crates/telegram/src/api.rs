//! Telegram Bot API transport (long polling over HTTPS).

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::commands::BotIdentity;
use crate::events::{Sender, TelegramEvent, TelegramUpdate};
use crate::messages::OutboundMessage;
use crate::polling::{TransportError, UpdateTransport};

/// Extra time on top of the long-poll timeout before the HTTP client gives up.
const REQUEST_GRACE_SECS: u64 = 10;

#[derive(Clone, Debug)]
pub struct BotApiSettings {
    pub base_url: String,
    pub bot_token: SecretString,
    pub poll_timeout_secs: u64,
}

pub struct BotApiTransport {
    client: Client,
    settings: BotApiSettings,
    identity: BotIdentity,
    state: Mutex<PollState>,
}

#[derive(Default)]
struct PollState {
    offset: Option<i64>,
    buffered: VecDeque<TelegramUpdate>,
}

#[derive(Serialize)]
struct GetUpdatesRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiUpdate {
    update_id: i64,
    message: Option<ApiMessage>,
    #[serde(flatten)]
    other: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiMessage {
    from: Option<ApiUser>,
    chat: ApiChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiUser {
    id: i64,
    #[serde(default)]
    first_name: String,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiChat {
    id: i64,
}

impl BotApiTransport {
    /// `identity` receives the bot's username on every successful connect.
    pub fn new(settings: BotApiSettings, identity: BotIdentity) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.poll_timeout_secs + REQUEST_GRACE_SECS))
            .build()
            .map_err(|error| TransportError::Connect(error.without_url().to_string()))?;

        Ok(Self { client, settings, identity, state: Mutex::new(PollState::default()) })
    }

    fn method_url(&self, method: &str) -> String {
        method_url(&self.settings.base_url, &self.settings.bot_token, method)
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, String>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|error| format!("{method} request failed: {}", error.without_url()))?;

        let status = response.status();
        let payload: ApiResponse<T> = response.json().await.map_err(|error| {
            format!("{method} returned {status} with undecodable body: {}", error.without_url())
        })?;

        into_result(method, payload)
    }

    async fn fetch_batch(&self, offset: Option<i64>) -> Result<Vec<TelegramUpdate>, String> {
        let request = GetUpdatesRequest {
            offset,
            timeout: self.settings.poll_timeout_secs,
            allowed_updates: &["message"],
        };
        let updates: Vec<ApiUpdate> = self.call("getUpdates", &request).await?;
        Ok(updates.into_iter().map(ApiUpdate::into_update).collect())
    }
}

#[async_trait]
impl UpdateTransport for BotApiTransport {
    fn name(&self) -> &'static str {
        "bot_api"
    }

    async fn connect(&self) -> Result<(), TransportError> {
        let me: ApiUser = self
            .call("getMe", &Map::new())
            .await
            .map_err(TransportError::Connect)?;
        if let Some(username) = me.username.as_deref() {
            self.identity.record_username(username);
        }
        info!(
            event_name = "system.telegram.authenticated",
            bot_id = me.id,
            bot_username = me.username.as_deref().unwrap_or("unknown"),
            "telegram bot identity confirmed"
        );
        Ok(())
    }

    async fn next_update(&self) -> Result<Option<TelegramUpdate>, TransportError> {
        let mut state = self.state.lock().await;

        loop {
            if let Some(update) = state.buffered.pop_front() {
                return Ok(Some(update));
            }

            let batch = self.fetch_batch(state.offset).await.map_err(TransportError::Receive)?;
            debug!(batch_size = batch.len(), offset = state.offset.unwrap_or_default(), "long poll returned");
            state.buffered.extend(batch);
        }
    }

    async fn acknowledge(&self, update_id: i64) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        state.offset = Some(next_offset(state.offset, update_id));
        Ok(())
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let _sent: Value = self.call("sendMessage", message).await.map_err(TransportError::Send)?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock().await;
        state.buffered.clear();
        Ok(())
    }
}

pub(crate) fn method_url(base_url: &str, bot_token: &SecretString, method: &str) -> String {
    format!("{}/bot{}/{method}", base_url.trim_end_matches('/'), bot_token.expose_secret())
}

/// The offset only ever moves forward; it confirms every update below it.
pub(crate) fn next_offset(current: Option<i64>, update_id: i64) -> i64 {
    current.map_or(update_id + 1, |offset| offset.max(update_id + 1))
}

pub(crate) fn into_result<T>(method: &str, payload: ApiResponse<T>) -> Result<T, String> {
    if !payload.ok {
        let description = payload.description.unwrap_or_else(|| "no description".to_owned());
        return Err(match payload.error_code {
            Some(code) => format!("{method} failed with error {code}: {description}"),
            None => format!("{method} failed: {description}"),
        });
    }

    payload.result.ok_or_else(|| format!("{method} returned ok without a result"))
}

impl ApiUpdate {
    pub(crate) fn into_update(self) -> TelegramUpdate {
        let event = match self.message {
            Some(ApiMessage { from, chat, text: Some(text) }) => {
                let sender =
                    from.map(|user| Sender { user_id: user.id, first_name: user.first_name });
                TelegramEvent::from_text(chat.id, sender, text)
            }
            Some(_) => TelegramEvent::Unsupported { kind: "non_text_message".to_owned() },
            None => TelegramEvent::Unsupported {
                kind: self.other.keys().next().cloned().unwrap_or_else(|| "unknown".to_owned()),
            },
        };

        TelegramUpdate { update_id: self.update_id, event }
    }
}
