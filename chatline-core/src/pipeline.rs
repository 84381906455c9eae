// ABOUTME: Wires consumer, channel, dispatcher and notification hub into a running pipeline.
// ABOUTME: The returned handle exposes the hub and health signal and performs explicit shutdown.

use anyhow::{Context, Result};
use chatline_account::{AccountService, Event};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::consumer::{ConsumerExit, EventConsumer};
use crate::dispatcher::{DispatchStats, EventDispatcher, HandlerRegistry};
use crate::health::PipelineHealth;
use crate::notify::NewMessageHub;

/// Entry point for assembling an event pipeline
pub struct Pipeline;

impl Pipeline {
    pub fn builder(account: Arc<dyn AccountService>) -> PipelineBuilder {
        PipelineBuilder {
            account,
            config: PipelineConfig::default(),
            hub: None,
            registry: None,
        }
    }
}

pub struct PipelineBuilder {
    account: Arc<dyn AccountService>,
    config: PipelineConfig,
    hub: Option<Arc<NewMessageHub>>,
    registry: Option<HandlerRegistry>,
}

impl PipelineBuilder {
    pub fn config(mut self, config: &PipelineConfig) -> Self {
        self.config = config.clone();
        self
    }

    /// Use an existing hub instead of creating one
    pub fn hub(mut self, hub: Arc<NewMessageHub>) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Replace the standard handlers. The caller wires its own hub.
    pub fn registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Spawn the dispatcher task and the consumer thread.
    ///
    /// Must be called from within a tokio runtime. The registry is moved
    /// into the dispatcher here, so every registration is visible before
    /// the first event is fetched.
    pub fn start(self) -> Result<PipelineHandle> {
        let runtime = tokio::runtime::Handle::try_current()
            .context("Event pipeline must be started inside a tokio runtime")?;

        let hub = self
            .hub
            .unwrap_or_else(|| Arc::new(NewMessageHub::new(self.config.subscriber_timeout())));
        let registry = match self.registry {
            Some(registry) => registry,
            None => HandlerRegistry::standard(Arc::clone(&self.account), Arc::clone(&hub)),
        };

        let health = PipelineHealth::new();
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel::<Event>(self.config.channel_capacity);

        let dispatcher = EventDispatcher::new(registry, self.config.handler_timeout());
        let dispatcher = runtime.spawn(dispatcher.run(rx));

        let consumer = EventConsumer::new(
            Arc::clone(&self.account),
            tx,
            cancel.clone(),
            health.clone(),
            self.config.poll_interval(),
        );
        let consumer = match consumer.spawn() {
            Ok(handle) => handle,
            Err(e) => {
                // The sender was dropped with the consumer, so the dispatcher ends on its own
                health.mark_stalled("Event consumer failed to start");
                return Err(e);
            }
        };

        health.mark_running();
        tracing::info!(
            backend = self.account.backend_name(),
            channel_capacity = self.config.channel_capacity,
            subscribers = hub.subscriber_count(),
            "Event pipeline started"
        );

        Ok(PipelineHandle {
            hub,
            health,
            cancel,
            dispatcher,
            consumer,
        })
    }
}

/// How the pipeline ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub consumer: ConsumerExit,
    pub stats: DispatchStats,
}

/// Handle to a running pipeline.
pub struct PipelineHandle {
    hub: Arc<NewMessageHub>,
    health: PipelineHealth,
    cancel: CancellationToken,
    dispatcher: JoinHandle<DispatchStats>,
    consumer: std::thread::JoinHandle<ConsumerExit>,
}

impl PipelineHandle {
    /// Hub to subscribe to new-message notifications
    pub fn hub(&self) -> Arc<NewMessageHub> {
        Arc::clone(&self.hub)
    }

    pub fn health(&self) -> PipelineHealth {
        self.health.clone()
    }

    /// Stop fetching, drain buffered events, and wait for both contexts.
    ///
    /// The consumer notices cancellation after its current poll; every
    /// event already in the channel is still dispatched.
    pub async fn shutdown(self) -> Result<PipelineReport> {
        tracing::info!("Shutting down event pipeline");
        self.cancel.cancel();
        self.health.mark_draining();
        self.finish().await
    }

    /// Wait for the pipeline to end on its own (source exhausted or
    /// dispatcher gone), without requesting shutdown.
    pub async fn join(self) -> Result<PipelineReport> {
        self.finish().await
    }

    async fn finish(self) -> Result<PipelineReport> {
        let consumer = self.consumer;
        let consumer = tokio::task::spawn_blocking(move || consumer.join())
            .await
            .context("Failed to join event consumer")?
            .map_err(|_| anyhow::anyhow!("Event consumer thread panicked"))?;

        let stats = self.dispatcher.await.context("Event dispatcher task failed")?;

        self.health.mark_stopped();
        tracing::info!(
            consumer = ?consumer,
            dispatched = stats.total(),
            health = ?self.health.current(),
            "Event pipeline finished"
        );
        Ok(PipelineReport { consumer, stats })
    }
}
