// ABOUTME: The AccountService trait every account backend implements.
// ABOUTME: Blocking event source plus async chat, message and contact operations.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::AccountError;
use crate::event::Event;
use crate::types::{Chat, ChatId, Contact, Message, MsgId};

/// A messaging account: the external collaborator the client front-end drives.
///
/// Implementations must be safe to call concurrently from the event polling
/// thread and from async tasks issuing queries and sends.
#[async_trait]
pub trait AccountService: Send + Sync {
    /// Backend name for logging
    fn backend_name(&self) -> &'static str;

    /// Block up to `wait` for the next event.
    ///
    /// Returns `Ok(None)` when nothing arrived in time and
    /// `Err(AccountError::SourceClosed)` once the source is closed and drained.
    fn next_event(&self, wait: Duration) -> Result<Option<Event>, AccountError>;

    /// Close the event source. Queued events are still delivered.
    fn close(&self);

    async fn is_configured(&self) -> Result<bool, AccountError>;

    /// Configure the account with e-mail address and password
    async fn configure(&self, addr: &str, mail_pw: &str) -> Result<(), AccountError>;

    async fn self_contact(&self) -> Result<Contact, AccountError>;

    async fn get_chats(&self) -> Result<Vec<Chat>, AccountError>;

    async fn get_chat(&self, id: ChatId) -> Result<Chat, AccountError>;

    /// All messages of a chat, oldest first
    async fn get_messages(&self, chat: ChatId) -> Result<Vec<Message>, AccountError>;

    async fn get_message_by_id(&self, id: MsgId) -> Result<Message, AccountError>;

    /// Send a text message, returning the id of the stored outgoing message
    async fn send_text(&self, chat: ChatId, text: &str) -> Result<MsgId, AccountError>;

    async fn mark_seen(&self, ids: &[MsgId]) -> Result<(), AccountError>;
}
