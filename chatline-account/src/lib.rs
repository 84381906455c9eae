// ABOUTME: Account service abstraction for chatline.
// ABOUTME: Event and message types, the AccountService trait, and pluggable backends.

pub mod config;
pub mod error;
pub mod event;
pub mod registry;
pub mod traits;
pub mod types;

pub mod backends;

pub use config::AccountConfig;
pub use error::AccountError;
pub use event::Event;
pub use registry::{AccountFactory, AccountRegistry};
pub use traits::AccountService;
pub use types::{Attachment, Chat, ChatId, Contact, ContactId, Message, MsgId};
