// ABOUTME: Entities owned by the account service: chats, contacts, messages, attachments.
// ABOUTME: Messages are read-only handles once resolved from their id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Read an id from an event payload field.
            ///
            /// Accepts a JSON number or a numeric string; anything else is `None`.
            pub fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()).map(Self),
                    Value::String(s) => s.trim().parse::<u32>().ok().map(Self),
                    _ => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u32> for $name {
            fn from(id: u32) -> Self {
                Self(id)
            }
        }
    };
}

id_type!(
    /// Identifies a chat within the account
    ChatId
);
id_type!(
    /// Identifies a message within the account
    MsgId
);
id_type!(
    /// Identifies a contact within the account
    ContactId
);

// =============================================================================
// Contacts and chats
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    /// E-mail address of the contact
    pub addr: String,
    pub display_name: Option<String>,
}

impl Contact {
    pub fn new(id: ContactId, addr: impl Into<String>) -> Self {
        Self {
            id,
            addr: addr.into(),
            display_name: None,
        }
    }

    /// Name to show in a conversation: display name if set, else the address
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.addr)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub name: String,
}

// =============================================================================
// Messages
// =============================================================================

/// A file attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub path: PathBuf,
    pub mime: String,
}

impl Attachment {
    /// Build an attachment, guessing the MIME type from the file name
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mime = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self { path, mime }
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}

/// A resolved message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MsgId,
    /// The chat this message belongs to
    pub chat_id: ChatId,
    pub sender: Contact,
    pub text: String,
    pub attachment: Option<Attachment>,
    pub timestamp: DateTime<Utc>,
    /// Whether this account sent the message
    pub outgoing: bool,
}

impl Message {
    pub fn is_attachment(&self) -> bool {
        self.attachment.is_some()
    }

    pub fn attachment_path(&self) -> Option<&Path> {
        self.attachment.as_ref().map(|a| a.path.as_path())
    }

    pub fn is_image(&self) -> bool {
        self.attachment.as_ref().is_some_and(Attachment::is_image)
    }
}
