// ABOUTME: Raw events produced by an account's event source.
// ABOUTME: A symbolic name plus two opaque payload fields, interpreted by whoever handles the name.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{ChatId, MsgId};

/// Prefix every backend event name carries (e.g. `DC_EVENT_INCOMING_MSG`)
pub const EVENT_NAME_PREFIX: &str = "DC_EVENT_";

pub const INFO: &str = "DC_EVENT_INFO";
pub const WARNING: &str = "DC_EVENT_WARNING";
pub const ERROR: &str = "DC_EVENT_ERROR";
pub const MSGS_CHANGED: &str = "DC_EVENT_MSGS_CHANGED";
pub const INCOMING_MSG: &str = "DC_EVENT_INCOMING_MSG";
pub const MSG_DELIVERED: &str = "DC_EVENT_MSG_DELIVERED";
pub const MSG_FAILED: &str = "DC_EVENT_MSG_FAILED";
pub const MSG_READ: &str = "DC_EVENT_MSG_READ";
pub const CHAT_MODIFIED: &str = "DC_EVENT_CHAT_MODIFIED";
pub const CONTACTS_CHANGED: &str = "DC_EVENT_CONTACTS_CHANGED";
pub const CONFIGURE_PROGRESS: &str = "DC_EVENT_CONFIGURE_PROGRESS";

/// A single event from the account's event source.
///
/// `data1` and `data2` are kind-specific; for message events they hold the
/// chat id and the message id, for log events `data2` holds the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub data1: Value,
    pub data2: Value,
}

impl Event {
    pub fn new(name: impl Into<String>, data1: impl Into<Value>, data2: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            data1: data1.into(),
            data2: data2.into(),
        }
    }

    /// A message arrived in `chat`
    pub fn incoming_msg(chat: ChatId, msg: MsgId) -> Self {
        Self::new(INCOMING_MSG, chat.0, msg.0)
    }

    /// Messages of `chat` changed (sent, deleted, drafted)
    pub fn msgs_changed(chat: ChatId, msg: MsgId) -> Self {
        Self::new(MSGS_CHANGED, chat.0, msg.0)
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(INFO, 0, Value::String(text.into()))
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(WARNING, 0, Value::String(text.into()))
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(ERROR, 0, Value::String(text.into()))
    }

    /// Configuration progress in permille (1000 = done, 0 = failed)
    pub fn configure_progress(permille: u32) -> Self {
        Self::new(CONFIGURE_PROGRESS, permille, Value::Null)
    }
}
