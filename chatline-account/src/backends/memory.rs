// ABOUTME: In-memory account backend - chats, contacts and messages held in process.
// ABOUTME: Used by tests and the demo client; traffic is injected with deliver_incoming/emit.
//!
//! # Example
//!
//! ```no_run
//! use chatline_account::backends::memory::MemoryAccount;
//! use chatline_account::AccountService;
//! use std::time::Duration;
//!
//! # async fn example() {
//! let account = MemoryAccount::new().configured_as("me@example.org");
//! let chat = account.create_chat("bob@example.org");
//! let msg = account.deliver_incoming(chat, "bob@example.org", "hi");
//!
//! let event = account.next_event(Duration::from_millis(10)).unwrap().unwrap();
//! assert_eq!(event.name, "DC_EVENT_INCOMING_MSG");
//! assert_eq!(account.get_message_by_id(msg).await.unwrap().text, "hi");
//! # }
//! ```

use async_trait::async_trait;
use chrono::Utc;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::AccountError;
use crate::event::Event;
use crate::traits::AccountService;
use crate::types::{Attachment, Chat, ChatId, Contact, ContactId, Message, MsgId};

/// Address of the contact that answers in echo mode
pub const ECHO_ADDR: &str = "echo@localhost";

const SELF_CONTACT: ContactId = ContactId(1);
/// Ids below this are reserved for special chats/messages
const FIRST_ID: u32 = 10;

#[derive(Default)]
struct State {
    self_addr: Option<String>,
    contacts: Vec<Contact>,
    chats: BTreeMap<ChatId, Chat>,
    messages: BTreeMap<MsgId, Message>,
    seen: HashSet<MsgId>,
    next_msg_id: u32,
    next_chat_id: u32,
    next_contact_id: u32,
}

impl State {
    fn new() -> Self {
        Self {
            next_msg_id: FIRST_ID,
            next_chat_id: FIRST_ID,
            next_contact_id: FIRST_ID,
            ..Default::default()
        }
    }

    fn self_contact(&self) -> Option<Contact> {
        self.self_addr
            .as_ref()
            .map(|addr| Contact::new(SELF_CONTACT, addr.clone()))
    }

    fn contact_for(&mut self, addr: &str) -> Contact {
        if let Some(contact) = self.contacts.iter().find(|c| c.addr == addr) {
            return contact.clone();
        }
        let contact = Contact::new(ContactId(self.next_contact_id), addr);
        self.next_contact_id += 1;
        self.contacts.push(contact.clone());
        contact
    }

    fn store(
        &mut self,
        chat_id: ChatId,
        sender: Contact,
        text: &str,
        attachment: Option<Attachment>,
        outgoing: bool,
    ) -> MsgId {
        let id = MsgId(self.next_msg_id);
        self.next_msg_id += 1;
        self.messages.insert(
            id,
            Message {
                id,
                chat_id,
                sender,
                text: text.to_string(),
                attachment,
                timestamp: Utc::now(),
                outgoing,
            },
        );
        id
    }
}

/// Account backend that keeps everything in memory.
pub struct MemoryAccount {
    state: Mutex<State>,
    events_tx: Mutex<Option<Sender<Event>>>,
    events_rx: Receiver<Event>,
    echo: bool,
    lookup_delay: Duration,
}

/// Factory config accepted by [`MemoryAccount::factory`]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MemoryConfig {
    /// Pre-configure the account with this address
    self_addr: Option<String>,
    /// Answer every sent text with an incoming copy from `echo@localhost`
    echo: bool,
    /// Chats to create up front, one per peer address
    chats: Vec<String>,
    lookup_delay_ms: u64,
    /// Rejected: nothing is persisted
    db_path: Option<String>,
}

impl MemoryAccount {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            state: Mutex::new(State::new()),
            events_tx: Mutex::new(Some(tx)),
            events_rx: rx,
            echo: false,
            lookup_delay: Duration::ZERO,
        }
    }

    /// Mark the account as configured for `addr` without emitting events
    pub fn configured_as(self, addr: &str) -> Self {
        self.lock().self_addr = Some(addr.to_string());
        self
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Delay every message lookup, standing in for slow storage
    pub fn with_lookup_delay(mut self, delay: Duration) -> Self {
        self.lookup_delay = delay;
        self
    }

    /// Factory function for the registry
    pub fn factory() -> crate::registry::AccountFactory {
        Box::new(|config: &serde_json::Value| {
            let config: MemoryConfig = serde_json::from_value(config.clone())
                .map_err(|e| anyhow::anyhow!("Invalid memory account config: {}", e))?;
            if let Some(db_path) = &config.db_path {
                anyhow::bail!(
                    "The memory backend keeps no database, remove db_path ({})",
                    db_path
                );
            }

            let mut account = MemoryAccount::new()
                .with_echo(config.echo)
                .with_lookup_delay(Duration::from_millis(config.lookup_delay_ms));
            if let Some(addr) = config.self_addr.as_deref() {
                account = account.configured_as(addr);
            }
            for peer in &config.chats {
                account.create_chat(peer);
            }
            if config.echo {
                account.create_chat(ECHO_ADDR);
            }
            Ok(Arc::new(account) as Arc<dyn AccountService>)
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue an event for the event source. Dropped once the source is closed.
    pub fn emit(&self, event: Event) {
        let tx = self.events_tx.lock().unwrap_or_else(|e| e.into_inner());
        match tx.as_ref() {
            Some(tx) => {
                // The receiver lives in self, so this cannot fail
                let _ = tx.send(event);
            }
            None => {
                tracing::debug!(event = %event.name, "Event source closed, dropping event");
            }
        }
    }

    /// Get or create the 1:1 chat with `peer`, named after the peer address
    pub fn create_chat(&self, peer: &str) -> ChatId {
        let mut state = self.lock();
        if let Some(chat) = state.chats.values().find(|c| c.name == peer) {
            return chat.id;
        }
        state.contact_for(peer);
        let id = ChatId(state.next_chat_id);
        state.next_chat_id += 1;
        state.chats.insert(
            id,
            Chat {
                id,
                name: peer.to_string(),
            },
        );
        id
    }

    /// Store a message from `from` in `chat` and emit an incoming-message event
    pub fn deliver_incoming(&self, chat: ChatId, from: &str, text: &str) -> MsgId {
        self.deliver(chat, from, text, None)
    }

    /// Like [`deliver_incoming`](Self::deliver_incoming) with a file attached
    pub fn deliver_attachment(
        &self,
        chat: ChatId,
        from: &str,
        text: &str,
        path: impl Into<PathBuf>,
    ) -> MsgId {
        self.deliver(chat, from, text, Some(Attachment::from_path(path)))
    }

    fn deliver(
        &self,
        chat: ChatId,
        from: &str,
        text: &str,
        attachment: Option<Attachment>,
    ) -> MsgId {
        let id = {
            let mut state = self.lock();
            let sender = state.contact_for(from);
            state.store(chat, sender, text, attachment, false)
        };
        self.emit(Event::incoming_msg(chat, id));
        id
    }

    /// Delete a message, e.g. to race an already emitted event
    pub fn remove_message(&self, id: MsgId) -> bool {
        self.lock().messages.remove(&id).is_some()
    }

    pub fn is_seen(&self, id: MsgId) -> bool {
        self.lock().seen.contains(&id)
    }
}

impl Default for MemoryAccount {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccountService for MemoryAccount {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn next_event(&self, wait: Duration) -> Result<Option<Event>, AccountError> {
        match self.events_rx.recv_timeout(wait) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(AccountError::SourceClosed),
        }
    }

    fn close(&self) {
        let closed = self
            .events_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .is_some();
        if closed {
            tracing::debug!("Memory account event source closed");
        }
    }

    async fn is_configured(&self) -> Result<bool, AccountError> {
        Ok(self.lock().self_addr.is_some())
    }

    async fn configure(&self, addr: &str, mail_pw: &str) -> Result<(), AccountError> {
        if !addr.contains('@') {
            self.emit(Event::configure_progress(0));
            return Err(AccountError::InvalidInput(format!(
                "not an e-mail address: {}",
                addr
            )));
        }
        if mail_pw.is_empty() {
            self.emit(Event::configure_progress(0));
            return Err(AccountError::InvalidInput("empty password".to_string()));
        }

        self.lock().self_addr = Some(addr.to_string());
        self.emit(Event::configure_progress(1000));
        self.emit(Event::info(format!("Configured as {}", addr)));
        Ok(())
    }

    async fn self_contact(&self) -> Result<Contact, AccountError> {
        self.lock().self_contact().ok_or(AccountError::NotConfigured)
    }

    async fn get_chats(&self) -> Result<Vec<Chat>, AccountError> {
        Ok(self.lock().chats.values().cloned().collect())
    }

    async fn get_chat(&self, id: ChatId) -> Result<Chat, AccountError> {
        self.lock()
            .chats
            .get(&id)
            .cloned()
            .ok_or_else(|| AccountError::chat_not_found(id))
    }

    async fn get_messages(&self, chat: ChatId) -> Result<Vec<Message>, AccountError> {
        let state = self.lock();
        if !state.chats.contains_key(&chat) {
            return Err(AccountError::chat_not_found(chat));
        }
        // BTreeMap keeps ids ascending, which is arrival order
        Ok(state
            .messages
            .values()
            .filter(|m| m.chat_id == chat)
            .cloned()
            .collect())
    }

    async fn get_message_by_id(&self, id: MsgId) -> Result<Message, AccountError> {
        if !self.lookup_delay.is_zero() {
            tokio::time::sleep(self.lookup_delay).await;
        }
        self.lock()
            .messages
            .get(&id)
            .cloned()
            .ok_or_else(|| AccountError::message_not_found(id))
    }

    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MsgId, AccountError> {
        if text.is_empty() {
            return Err(AccountError::InvalidInput("empty message".to_string()));
        }

        let (sent, echoed) = {
            let mut state = self.lock();
            let me = state.self_contact().ok_or(AccountError::NotConfigured)?;
            if !state.chats.contains_key(&chat) {
                return Err(AccountError::chat_not_found(chat));
            }
            let sent = state.store(chat, me, text, None, true);
            let echoed = if self.echo {
                let echo = state.contact_for(ECHO_ADDR);
                Some(state.store(chat, echo, text, None, false))
            } else {
                None
            };
            (sent, echoed)
        };

        self.emit(Event::msgs_changed(chat, sent));
        if let Some(echoed) = echoed {
            self.emit(Event::incoming_msg(chat, echoed));
        }
        Ok(sent)
    }

    async fn mark_seen(&self, ids: &[MsgId]) -> Result<(), AccountError> {
        let mut state = self.lock();
        for id in ids {
            if state.messages.contains_key(id) {
                state.seen.insert(*id);
            }
        }
        Ok(())
    }
}
