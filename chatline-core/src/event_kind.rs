// ABOUTME: Closed set of backend event kinds the client knows how to route.
// ABOUTME: Raw event names are normalized (prefix stripped, lower-cased) and mapped onto these.

use chatline_account::event::EVENT_NAME_PREFIX;
use std::fmt;

/// Event kinds the dispatcher can register handlers for.
///
/// Names the backend emits that are not listed here normalize to `None` and
/// are ignored, so newer backends can add kinds without breaking the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Info,
    Warning,
    Error,
    MsgsChanged,
    IncomingMsg,
    MsgDelivered,
    MsgFailed,
    MsgRead,
    ChatModified,
    ContactsChanged,
    ConfigureProgress,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        Self::Info,
        Self::Warning,
        Self::Error,
        Self::MsgsChanged,
        Self::IncomingMsg,
        Self::MsgDelivered,
        Self::MsgFailed,
        Self::MsgRead,
        Self::ChatModified,
        Self::ContactsChanged,
        Self::ConfigureProgress,
    ];

    /// Normalized handler key, e.g. `incoming_msg`
    pub fn key(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::MsgsChanged => "msgs_changed",
            Self::IncomingMsg => "incoming_msg",
            Self::MsgDelivered => "msg_delivered",
            Self::MsgFailed => "msg_failed",
            Self::MsgRead => "msg_read",
            Self::ChatModified => "chat_modified",
            Self::ContactsChanged => "contacts_changed",
            Self::ConfigureProgress => "configure_progress",
        }
    }

    /// Map a raw event name (`DC_EVENT_INCOMING_MSG`, `incoming_msg`, ...) to a kind
    pub fn from_name(name: &str) -> Option<Self> {
        let key = normalize_name(name);
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Strip the backend's constant-name prefix and lower-case the rest
pub fn normalize_name(name: &str) -> String {
    let name = name.trim();
    name.strip_prefix(EVENT_NAME_PREFIX)
        .unwrap_or(name)
        .to_lowercase()
}
