// ABOUTME: Line-oriented chat view - the display surface that subscribes to new messages.
// ABOUTME: Shows the active chat's history and live messages, and marks shown messages seen.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chatline_account::{AccountService, Chat, ChatId, Message, MsgId};
use chatline_core::MessageSubscriber;
use std::collections::HashSet;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Renders one chat at a time to a writer (usually stdout).
///
/// Registered with the notification hub; messages for chats other than the
/// active one are ignored.
///
/// Selecting a chat and showing a live message are serialized on `shown`, so
/// a message arriving while a chat opens is either in the replayed history or
/// shown live after it, never lost and never shown twice.
pub struct ChatView<W> {
    account: Arc<dyn AccountService>,
    out: Mutex<W>,
    active: Mutex<Option<ChatId>>,
    /// Ids already rendered for the active chat
    shown: tokio::sync::Mutex<HashSet<MsgId>>,
}

impl<W: Write + Send> ChatView<W> {
    pub fn new(account: Arc<dyn AccountService>, out: W) -> Self {
        Self {
            account,
            out: Mutex::new(out),
            active: Mutex::new(None),
            shown: tokio::sync::Mutex::new(HashSet::new()),
        }
    }

    pub fn active_chat(&self) -> Option<ChatId> {
        *self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make `id` the active chat and replay its history.
    pub async fn select_chat(&self, id: ChatId) -> Result<Chat> {
        let mut shown = self.shown.lock().await;
        let chat = self
            .account
            .get_chat(id)
            .await
            .with_context(|| format!("Cannot open chat {}", id))?;
        let history = self
            .account
            .get_messages(id)
            .await
            .with_context(|| format!("Failed to load messages of chat {}", id))?;

        *self.active.lock().unwrap_or_else(|e| e.into_inner()) = Some(id);
        *shown = history.iter().map(|m| m.id).collect();
        tracing::debug!(chat_id = %id, messages = history.len(), "Chat selected");

        self.write_lines(|out| {
            writeln!(out)?;
            writeln!(out, "== {} ==", chat.name)
        })?;
        for message in &history {
            self.render(message)?;
        }
        self.mark_seen(history.iter().filter(|m| !m.outgoing).map(|m| m.id))
            .await;
        Ok(chat)
    }

    /// Show `message` if it belongs to the active chat.
    ///
    /// Returns whether it was shown. Waits for a chat selection in progress.
    pub async fn show_message(&self, message: &Message) -> Result<bool> {
        let mut shown = self.shown.lock().await;
        if self.active_chat() != Some(message.chat_id) {
            tracing::trace!(
                chat_id = %message.chat_id,
                msg_id = %message.id,
                "Message for inactive chat, not shown"
            );
            return Ok(false);
        }
        if !shown.insert(message.id) {
            tracing::trace!(msg_id = %message.id, "Message already in replayed history");
            return Ok(false);
        }
        self.render(message)?;
        if !message.outgoing {
            self.mark_seen(std::iter::once(message.id)).await;
        }
        Ok(true)
    }

    /// Echo a line the user just sent
    pub fn display_own(&self, addr: &str, text: &str) -> Result<()> {
        self.write_lines(|out| writeln!(out, "<{}> {}", addr, text))
    }

    /// Print the chat list, numbered from 1 in the given order
    pub fn show_chat_list(&self, chats: &[Chat]) -> Result<()> {
        let active = self.active_chat();
        self.write_lines(|out| {
            if chats.is_empty() {
                return writeln!(out, "-- no chats yet");
            }
            writeln!(out, "-- chats:")?;
            for (n, chat) in chats.iter().enumerate() {
                let marker = if Some(chat.id) == active { '*' } else { ' ' };
                writeln!(out, "{}{:>3}. {} (#{})", marker, n + 1, chat.name, chat.id)?;
            }
            Ok(())
        })
    }

    /// Status line that is not part of any conversation
    pub fn notice(&self, text: &str) -> Result<()> {
        self.write_lines(|out| writeln!(out, "-- {}", text))
    }

    fn render(&self, message: &Message) -> Result<()> {
        self.write_lines(|out| {
            writeln!(out, "<{}> {}", message.sender.label(), message.text)?;
            if let Some(attachment) = &message.attachment {
                let kind = if attachment.is_image() { "image" } else { "file" };
                writeln!(out, "[{}: {}]", kind, attachment.path.display())?;
            }
            Ok(())
        })
    }

    // Seen state is best effort: failing to mark must not hide the message
    async fn mark_seen(&self, ids: impl Iterator<Item = MsgId>) {
        let ids: Vec<MsgId> = ids.collect();
        if ids.is_empty() {
            return;
        }
        if let Err(e) = self.account.mark_seen(&ids).await {
            tracing::warn!(error = %e, count = ids.len(), "Failed to mark messages seen");
        }
    }

    /// Write under the lock and flush so the newest line is always visible
    fn write_lines(
        &self,
        f: impl FnOnce(&mut W) -> std::io::Result<()>,
    ) -> Result<()> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut *out)
            .and_then(|_| out.flush())
            .context("Failed to write to terminal")
    }
}

#[async_trait]
impl<W: Write + Send> MessageSubscriber for ChatView<W> {
    fn name(&self) -> &str {
        "chat-view"
    }

    async fn on_new_message(&self, message: &Message) -> Result<()> {
        self.show_message(message).await.map(|_| ())
    }
}
