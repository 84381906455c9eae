// ABOUTME: Event dispatcher -- maps event kinds to handlers and runs them on the delivery context.
// ABOUTME: Handlers run one at a time in arrival order, each bounded by a timeout.

use anyhow::Result;
use chatline_account::{AccountService, Event};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::event_kind::EventKind;
use crate::handlers::{IncomingMessageHandler, LogEventHandler, LogLevel};
use crate::metrics;
use crate::notify::NewMessageHub;

/// Handler invoked with an event's two payload fields
pub type EventHandlerFn = Box<dyn Fn(Value, Value) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// Mapping from event kind to handler.
///
/// Built before the pipeline starts and moved into the dispatcher, after
/// which it can no longer be changed.
pub struct HandlerRegistry {
    handlers: HashMap<EventKind, EventHandlerFn>,
}

impl HandlerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for `kind`, replacing any earlier one
    pub fn register<F, Fut>(mut self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(Value, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let replaced = self
            .handlers
            .insert(kind, Box::new(move |data1, data2| handler(data1, data2).boxed()))
            .is_some();
        if replaced {
            tracing::debug!(kind = %kind, "Replaced event handler");
        }
        self
    }

    /// Registry with the client's standard handlers: incoming messages are
    /// resolved and published on `hub`, backend log events go to tracing.
    pub fn standard(account: Arc<dyn AccountService>, hub: Arc<NewMessageHub>) -> Self {
        let backend = account.backend_name();
        let incoming = Arc::new(IncomingMessageHandler::new(account, hub));
        let log = Arc::new(LogEventHandler::new(backend));

        let mut registry = Self::new().register(EventKind::IncomingMsg, move |data1, data2| {
            let incoming = Arc::clone(&incoming);
            async move { incoming.handle(data1, data2).await }
        });

        for (kind, level) in [
            (EventKind::Info, LogLevel::Info),
            (EventKind::Warning, LogLevel::Warning),
            (EventKind::Error, LogLevel::Error),
        ] {
            let log = Arc::clone(&log);
            registry = registry.register(kind, move |data1, data2| {
                log.handle(level, &data1, &data2);
                futures::future::ready(Ok(()))
            });
        }
        registry
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Registered kinds, in no particular order
    pub fn kinds(&self) -> Vec<EventKind> {
        self.handlers.keys().copied().collect()
    }

    fn get(&self, kind: EventKind) -> Option<&EventHandlerFn> {
        self.handlers.get(&kind)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// What happened to a single dispatched event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler ran to completion
    Handled,
    /// The name is not a known event kind
    UnknownKind,
    /// Known kind, but nothing is registered for it
    Unhandled,
    /// The handler returned an error or panicked
    Failed,
    /// The handler exceeded the handler timeout and was abandoned
    TimedOut,
}

impl DispatchOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Handled => "handled",
            Self::UnknownKind => "unknown_kind",
            Self::Unhandled => "unhandled",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Per-outcome totals returned when the dispatcher stops
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub handled: u64,
    pub unknown_kind: u64,
    pub unhandled: u64,
    pub failed: u64,
    pub timed_out: u64,
}

impl DispatchStats {
    pub fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Handled => self.handled += 1,
            DispatchOutcome::UnknownKind => self.unknown_kind += 1,
            DispatchOutcome::Unhandled => self.unhandled += 1,
            DispatchOutcome::Failed => self.failed += 1,
            DispatchOutcome::TimedOut => self.timed_out += 1,
        }
    }

    /// Number of events dispatched, whatever the outcome
    pub fn total(&self) -> u64 {
        self.handled + self.unknown_kind + self.unhandled + self.failed + self.timed_out
    }
}

/// Routes events to their handlers.
pub struct EventDispatcher {
    registry: HandlerRegistry,
    handler_timeout: Duration,
}

impl EventDispatcher {
    pub fn new(registry: HandlerRegistry, handler_timeout: Duration) -> Self {
        Self {
            registry,
            handler_timeout,
        }
    }

    /// Dispatch a single event to the handler registered for its kind.
    ///
    /// Never fails: handler errors, panics and timeouts are logged and
    /// reported through the returned outcome.
    pub async fn dispatch(&self, event: Event) -> DispatchOutcome {
        let Event { name, data1, data2 } = event;

        let Some(kind) = EventKind::from_name(&name) else {
            tracing::debug!(event = %name, "Ignoring unknown event kind");
            metrics::record_dispatch("unknown", DispatchOutcome::UnknownKind.as_str());
            return DispatchOutcome::UnknownKind;
        };

        let Some(handler) = self.registry.get(kind) else {
            tracing::trace!(kind = %kind, "No handler registered");
            metrics::record_dispatch(kind.key(), DispatchOutcome::Unhandled.as_str());
            return DispatchOutcome::Unhandled;
        };

        let outcome = self.invoke(kind, handler, data1, data2).await;
        metrics::record_dispatch(kind.key(), outcome.as_str());
        outcome
    }

    async fn invoke(
        &self,
        kind: EventKind,
        handler: &EventHandlerFn,
        data1: Value,
        data2: Value,
    ) -> DispatchOutcome {
        // Building the future runs handler code too, so guard it as well
        let future = match std::panic::catch_unwind(AssertUnwindSafe(|| handler(data1, data2))) {
            Ok(future) => future,
            Err(_) => {
                tracing::error!(kind = %kind, "Event handler panicked");
                return DispatchOutcome::Failed;
            }
        };

        match tokio::time::timeout(self.handler_timeout, AssertUnwindSafe(future).catch_unwind())
            .await
        {
            Ok(Ok(Ok(()))) => DispatchOutcome::Handled,
            Ok(Ok(Err(e))) => {
                tracing::warn!(kind = %kind, error = %format!("{:#}", e), "Event handler failed");
                DispatchOutcome::Failed
            }
            Ok(Err(_)) => {
                tracing::error!(kind = %kind, "Event handler panicked");
                DispatchOutcome::Failed
            }
            Err(_) => {
                tracing::warn!(
                    kind = %kind,
                    timeout_ms = self.handler_timeout.as_millis() as u64,
                    "Event handler timed out, dropping event"
                );
                DispatchOutcome::TimedOut
            }
        }
    }

    /// Dispatch events in arrival order until the channel closes.
    ///
    /// Channel closure is the normal way to stop: every event still buffered
    /// is dispatched first.
    pub async fn run(self, mut rx: mpsc::Receiver<Event>) -> DispatchStats {
        let mut stats = DispatchStats::default();
        while let Some(event) = rx.recv().await {
            let outcome = self.dispatch(event).await;
            stats.record(outcome);
        }
        tracing::info!(
            dispatched = stats.total(),
            handled = stats.handled,
            failed = stats.failed,
            timed_out = stats.timed_out,
            "Event channel closed, dispatcher stopped"
        );
        stats
    }
}
