// ABOUTME: Core library for the chatline client - event pipeline and its plumbing.
// ABOUTME: Consumer thread, dispatcher, notification hub, health signal, config and paths.

pub mod config;
pub mod consumer;
pub mod dispatcher;
pub mod event_kind;
pub mod handlers;
pub mod health;
pub mod metrics;
pub mod notify;
pub mod paths;
pub mod pipeline;

pub use config::{Config, LoggingConfig, PipelineConfig};
pub use consumer::{ConsumerExit, EventConsumer};
pub use dispatcher::{DispatchOutcome, DispatchStats, EventDispatcher, HandlerRegistry};
pub use event_kind::{normalize_name, EventKind};
pub use handlers::IncomingMessageHandler;
pub use health::{HealthState, PipelineHealth};
pub use notify::{MessageSubscriber, NewMessageHub};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineHandle, PipelineReport};
