// ABOUTME: Input line parsing and execution for the terminal client.
// ABOUTME: Slash commands navigate chats; any other non-empty line is sent to the active chat.

use anyhow::{Context, Result};
use chatline_account::{AccountService, Chat, ChatId};
use std::io::Write;
use std::sync::Arc;

use crate::view::ChatView;

pub const HELP: &str = "\
/chats          list chats
/open <n|id>    open chat n from the list, or the chat with that id
/help           show this help
/quit           leave
//text          send text that starts with a slash
anything else is sent to the open chat";

/// One parsed line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    /// Blank or whitespace-only; ignored
    Empty,
    /// Text to send to the active chat
    Text(String),
    ListChats,
    /// `/open` with a list position or chat id
    Open(u32),
    Help,
    Quit,
    /// A known command used incorrectly
    Usage(&'static str),
    /// An unrecognized slash command
    Unknown(String),
}

impl InputLine {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }

        // "//" escapes a leading slash
        if let Some(escaped) = trimmed.strip_prefix("//") {
            return Self::Text(format!("/{}", escaped));
        }

        let Some(command) = trimmed.strip_prefix('/') else {
            return Self::Text(trimmed.to_string());
        };

        let mut parts = command.split_whitespace();
        let name = parts.next().unwrap_or("").to_lowercase();
        let arg = parts.next();
        match name.as_str() {
            "chats" | "list" => Self::ListChats,
            "open" => match arg.map(str::parse::<u32>) {
                Some(Ok(n)) => Self::Open(n),
                _ => Self::Usage("/open <n|id>"),
            },
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => Self::Unknown(name),
        }
    }
}

/// What the input loop should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Quit,
}

/// Executes input lines against the account and the view.
pub struct Composer<W> {
    account: Arc<dyn AccountService>,
    view: Arc<ChatView<W>>,
    /// Chats as last shown by `/chats`, for `/open <n>`
    listed: Vec<Chat>,
}

impl<W: Write + Send> Composer<W> {
    pub fn new(account: Arc<dyn AccountService>, view: Arc<ChatView<W>>) -> Self {
        Self {
            account,
            view,
            listed: Vec::new(),
        }
    }

    pub async fn handle_line(&mut self, line: &str) -> Result<Action> {
        self.execute(InputLine::parse(line)).await
    }

    pub async fn execute(&mut self, input: InputLine) -> Result<Action> {
        match input {
            InputLine::Empty => {}
            InputLine::Text(text) => self.send(&text).await?,
            InputLine::ListChats => self.list_chats().await?,
            InputLine::Open(n) => self.open(n).await?,
            InputLine::Help => {
                for line in HELP.lines() {
                    self.view.notice(line)?;
                }
            }
            InputLine::Quit => return Ok(Action::Quit),
            InputLine::Usage(usage) => self.view.notice(&format!("usage: {}", usage))?,
            InputLine::Unknown(name) => self
                .view
                .notice(&format!("unknown command /{}, try /help", name))?,
        }
        Ok(Action::Continue)
    }

    pub async fn list_chats(&mut self) -> Result<()> {
        self.listed = self
            .account
            .get_chats()
            .await
            .context("Failed to list chats")?;
        self.view.show_chat_list(&self.listed)
    }

    /// Resolve a list position (1-based, from the last `/chats`) or else a chat id
    fn resolve(&self, n: u32) -> ChatId {
        match (n as usize).checked_sub(1).and_then(|i| self.listed.get(i)) {
            Some(chat) => chat.id,
            None => ChatId(n),
        }
    }

    async fn open(&mut self, n: u32) -> Result<()> {
        let id = self.resolve(n);
        if let Err(e) = self.view.select_chat(id).await {
            tracing::debug!(chat_id = %id, error = %format!("{:#}", e), "Open failed");
            self.view.notice(&format!("{:#}", e))?;
        }
        Ok(())
    }

    async fn send(&mut self, text: &str) -> Result<()> {
        let Some(chat) = self.view.active_chat() else {
            return self.view.notice("no chat open, use /chats and /open <n>");
        };

        let me = self
            .account
            .self_contact()
            .await
            .context("Account has no self contact")?;
        self.view.display_own(&me.addr, text)?;

        match self.account.send_text(chat, text).await {
            Ok(msg_id) => {
                tracing::debug!(chat_id = %chat, msg_id = %msg_id, "Message sent");
            }
            Err(e) => {
                tracing::warn!(chat_id = %chat, error = %e, "Failed to send message");
                self.view.notice(&format!("not sent: {}", e))?;
            }
        }
        Ok(())
    }
}
