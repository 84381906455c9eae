// ABOUTME: Handlers the dispatcher invokes for specific event kinds.
// ABOUTME: Incoming messages are resolved and republished; backend log events go to tracing.

use anyhow::{anyhow, Context, Result};
use chatline_account::{AccountService, ChatId, Message, MsgId};
use serde_json::Value;
use std::sync::Arc;

use crate::notify::NewMessageHub;

/// Turns "message arrived" events into resolved new-message notifications.
pub struct IncomingMessageHandler {
    account: Arc<dyn AccountService>,
    hub: Arc<NewMessageHub>,
}

impl IncomingMessageHandler {
    pub fn new(account: Arc<dyn AccountService>, hub: Arc<NewMessageHub>) -> Self {
        Self { account, hub }
    }

    /// Entry point for raw `incoming_msg` payloads: `data1` = chat id, `data2` = message id
    pub async fn handle(&self, data1: Value, data2: Value) -> Result<()> {
        let msg_id = MsgId::from_value(&data2)
            .ok_or_else(|| anyhow!("Incoming message event without a message id: {}", data2))?;
        self.on_incoming_message(ChatId::from_value(&data1), msg_id)
            .await
            .map(|_| ())
    }

    /// Resolve `msg_id` and publish it to subscribers.
    ///
    /// The chat id is informational; the resolved message carries its own
    /// chat reference. On lookup failure nothing is published.
    pub async fn on_incoming_message(
        &self,
        chat_id: Option<ChatId>,
        msg_id: MsgId,
    ) -> Result<Message> {
        let message = match self.account.get_message_by_id(msg_id).await {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    chat_id = ?chat_id,
                    msg_id = %msg_id,
                    error = %e,
                    "Could not resolve incoming message, dropping event"
                );
                return Err(e).with_context(|| format!("Failed to resolve message {}", msg_id));
            }
        };

        let delivered = self.hub.publish(&message).await;
        tracing::debug!(
            chat_id = %message.chat_id,
            msg_id = %msg_id,
            delivered,
            "Published new message"
        );
        Ok(message)
    }
}

/// Severity of a backend log event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// Forwards the backend's own info/warning/error events into our log.
pub struct LogEventHandler {
    backend: &'static str,
}

impl LogEventHandler {
    pub fn new(backend: &'static str) -> Self {
        Self { backend }
    }

    /// `data2` holds the text; `data1` is a backend-specific code
    pub fn handle(&self, level: LogLevel, data1: &Value, data2: &Value) {
        let text = match data2 {
            Value::String(s) => s.as_str(),
            Value::Null => "",
            _ => {
                tracing::debug!(backend = self.backend, payload = %data2, "Non-text log event");
                return;
            }
        };
        match level {
            LogLevel::Info => tracing::info!(backend = self.backend, code = %data1, "{}", text),
            LogLevel::Warning => tracing::warn!(backend = self.backend, code = %data1, "{}", text),
            LogLevel::Error => tracing::error!(backend = self.backend, code = %data1, "{}", text),
        }
    }
}
