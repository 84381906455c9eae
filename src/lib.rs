// ABOUTME: Root library module for the chatline terminal client
// ABOUTME: Exposes the chat view, the composer, the session loop and logging; the pipeline lives in chatline-core

pub mod compose;
pub mod logging;
pub mod session;
pub mod view;

// Re-export the crates the client is built from
pub use chatline_account as account;
pub use chatline_core::{config, paths, pipeline};
