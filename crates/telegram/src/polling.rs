use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::events::{EventContext, EventDispatcher, HandlerResult, TelegramUpdate};
use crate::messages::OutboundMessage;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport ack failed: {0}")]
    Acknowledge(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait UpdateTransport: Send + Sync {
    fn name(&self) -> &'static str;
    async fn connect(&self) -> Result<(), TransportError>;
    /// `Ok(None)` means the update stream has ended.
    async fn next_update(&self) -> Result<Option<TelegramUpdate>, TransportError>;
    async fn acknowledge(&self, update_id: i64) -> Result<(), TransportError>;
    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopUpdateTransport;

#[async_trait]
impl UpdateTransport for NoopUpdateTransport {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_update(&self) -> Result<Option<TelegramUpdate>, TransportError> {
        Ok(None)
    }

    async fn acknowledge(&self, _update_id: i64) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send(&self, _message: &OutboundMessage) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

struct PumpFailure {
    error: TransportError,
    handled_updates: usize,
}

pub struct PollingRunner {
    transport: Arc<dyn UpdateTransport>,
    dispatcher: EventDispatcher,
    reconnect_policy: ReconnectPolicy,
    shutdown: Notify,
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn UpdateTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy, shutdown: Notify::new() }
    }

    /// Stops the loop the next time it waits for an update; an update being
    /// handled is answered first.
    pub fn request_shutdown(&self) {
        self.shutdown.notify_one();
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Pumps updates until the stream ends or reconnect retries are exhausted.
    ///
    /// A connection that delivered at least one update resets the retry budget.
    pub async fn start(&self) -> Result<()> {
        let mut attempt = 0;

        loop {
            let failure = match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(failure) => failure,
            };
            if failure.handled_updates > 0 {
                attempt = 0;
            }

            warn!(
                attempt,
                max_retries = self.reconnect_policy.max_retries,
                error = %failure.error,
                "polling transport failed"
            );

            if attempt >= self.reconnect_policy.max_retries {
                warn!(
                    max_retries = self.reconnect_policy.max_retries,
                    "polling retries exhausted; continuing process without crash"
                );
                return Ok(());
            }

            let delay = self.reconnect_policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::select! {
                    () = self.shutdown.notified() => return Ok(()),
                    () = tokio::time::sleep(delay) => {}
                }
            }
            attempt += 1;
        }
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), PumpFailure> {
        let mut handled_updates = 0;
        let fail = |error: TransportError, handled_updates: usize| PumpFailure {
            error,
            handled_updates,
        };

        info!(attempt, transport = self.transport.name(), "opening polling transport connection");
        self.transport.connect().await.map_err(|error| fail(error, 0))?;
        info!(attempt, "polling transport connected");

        loop {
            let next = tokio::select! {
                biased;
                () = self.shutdown.notified() => {
                    info!(attempt, "shutdown requested; closing polling transport");
                    self.transport.disconnect().await.map_err(|error| fail(error, handled_updates))?;
                    return Ok(());
                }
                next = self.transport.next_update() => next,
            };
            let Some(update) = next.map_err(|error| fail(error, handled_updates))? else {
                info!(attempt, "polling transport stream closed");
                self.transport.disconnect().await.map_err(|error| fail(error, handled_updates))?;
                return Ok(());
            };
            handled_updates += 1;
            self.handle_update(update).await;
        }
    }

    async fn handle_update(&self, update: TelegramUpdate) {
        let context = EventContext::for_update(update.update_id);
        let chat_id = update.event.chat_id().unwrap_or_default();

        info!(
            event_name = "ingress.telegram.update_received",
            update_id = update.update_id,
            event_type = ?update.event.event_type(),
            correlation_id = %context.correlation_id,
            chat_id,
            "received telegram update"
        );

        if let Err(error) = self.transport.acknowledge(update.update_id).await {
            warn!(
                event_name = "ingress.telegram.ack_sent",
                update_id = update.update_id,
                correlation_id = %context.correlation_id,
                error = %error,
                "failed to acknowledge telegram update"
            );
        } else {
            debug!(
                event_name = "ingress.telegram.ack_sent",
                update_id = update.update_id,
                correlation_id = %context.correlation_id,
                "acknowledged telegram update"
            );
        }

        let message = match self.dispatcher.dispatch(&update, &context).await {
            Ok(HandlerResult::Responded(message)) => message,
            Ok(_) => return,
            Err(error) => {
                warn!(
                    update_id = update.update_id,
                    correlation_id = %context.correlation_id,
                    chat_id,
                    error = %error,
                    "event dispatch failed; continuing polling loop"
                );
                return;
            }
        };

        match self.transport.send(&message).await {
            Ok(()) => debug!(
                event_name = "egress.telegram.message_sent",
                correlation_id = %context.correlation_id,
                chat_id = message.chat_id,
                "reply delivered"
            ),
            Err(error) => warn!(
                event_name = "egress.telegram.message_failed",
                correlation_id = %context.correlation_id,
                chat_id = message.chat_id,
                error = %error,
                "failed to deliver reply; continuing polling loop"
            ),
        }
    }
}

impl Default for PollingRunner {
    fn default() -> Self {
        Self::new(Arc::new(NoopUpdateTransport), EventDispatcher::new(), ReconnectPolicy::default())
    }
}
