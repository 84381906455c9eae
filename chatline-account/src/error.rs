// ABOUTME: Typed errors returned across the account service boundary.
// ABOUTME: Lets callers tell a missing entity or a closed event source apart from backend failures.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountError {
    /// The referenced entity does not exist (anymore)
    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: u32 },

    /// The event source was closed and has no more events
    #[error("Event source closed")]
    SourceClosed,

    #[error("Account is not configured")]
    NotConfigured,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl AccountError {
    pub fn message_not_found(id: crate::MsgId) -> Self {
        Self::NotFound {
            what: "message",
            id: id.0,
        }
    }

    pub fn chat_not_found(id: crate::ChatId) -> Self {
        Self::NotFound {
            what: "chat",
            id: id.0,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
