// ABOUTME: Event consumer -- drains the account's blocking event source on a dedicated thread.
// ABOUTME: Forwards every event unchanged and in order onto the dispatcher's channel.

use anyhow::{Context, Result};
use chatline_account::{AccountError, AccountService, Event};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::health::PipelineHealth;
use crate::metrics;

const THREAD_NAME: &str = "chatline-events";

/// Why the consumer loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerExit {
    /// Shutdown was requested
    Cancelled,
    /// The dispatcher dropped its end of the channel
    DispatcherGone,
    /// The event source failed; nothing more will arrive
    SourceExhausted(AccountError),
}

/// Bridges the account's blocking event source into the dispatch channel.
///
/// Runs on its own OS thread because fetching blocks; it never touches
/// anything but the account and the channel sender.
pub struct EventConsumer {
    account: Arc<dyn AccountService>,
    tx: mpsc::Sender<Event>,
    cancel: CancellationToken,
    health: PipelineHealth,
    poll_interval: Duration,
}

impl EventConsumer {
    pub fn new(
        account: Arc<dyn AccountService>,
        tx: mpsc::Sender<Event>,
        cancel: CancellationToken,
        health: PipelineHealth,
        poll_interval: Duration,
    ) -> Self {
        Self {
            account,
            tx,
            cancel,
            health,
            poll_interval,
        }
    }

    /// Start [`run`](Self::run) on a dedicated thread
    pub fn spawn(self) -> Result<JoinHandle<ConsumerExit>> {
        std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || self.run())
            .context("Failed to spawn event consumer thread")
    }

    /// Fetch and forward events until cancelled or the source fails.
    ///
    /// Must not be called from within an async context: publishing blocks
    /// while the channel is full.
    pub fn run(self) -> ConsumerExit {
        tracing::info!(
            backend = self.account.backend_name(),
            poll_ms = self.poll_interval.as_millis() as u64,
            "Event consumer started"
        );

        let exit = loop {
            if self.cancel.is_cancelled() {
                break ConsumerExit::Cancelled;
            }

            match self.account.next_event(self.poll_interval) {
                Ok(Some(event)) => {
                    metrics::record_event_consumed();
                    tracing::trace!(event = %event.name, "Consumed event");
                    if self.tx.blocking_send(event).is_err() {
                        break ConsumerExit::DispatcherGone;
                    }
                }
                // Idle poll; loop to re-check cancellation
                Ok(None) => {}
                Err(e) => break ConsumerExit::SourceExhausted(e),
            }
        };

        match &exit {
            ConsumerExit::Cancelled => {
                tracing::info!("Event consumer cancelled");
            }
            ConsumerExit::DispatcherGone => {
                tracing::error!("Event channel closed by dispatcher, consumer stopping");
                self.health.mark_stalled("Dispatcher stopped");
            }
            ConsumerExit::SourceExhausted(e) => {
                tracing::error!(error = %e, "Event source failed, no more events will be delivered");
                self.health
                    .mark_stalled(format!("Event source failed: {}", e));
            }
        }
        exit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthState;
    use chatline_account::backends::memory::MemoryAccount;

    const POLL: Duration = Duration::from_millis(10);

    fn consumer(
        account: &Arc<MemoryAccount>,
        tx: mpsc::Sender<Event>,
    ) -> (EventConsumer, CancellationToken, PipelineHealth) {
        let cancel = CancellationToken::new();
        let health = PipelineHealth::new();
        let consumer = EventConsumer::new(
            account.clone(),
            tx,
            cancel.clone(),
            health.clone(),
            POLL,
        );
        (consumer, cancel, health)
    }

    #[test]
    fn test_forwards_events_in_order_until_source_closes() {
        let account = Arc::new(MemoryAccount::new());
        for i in 0..20 {
            account.emit(Event::new("DC_EVENT_INFO", i, format!("event {}", i)));
        }
        account.close();

        let (tx, mut rx) = mpsc::channel(64);
        let (consumer, _cancel, health) = consumer(&account, tx);
        let exit = consumer.run();

        assert_eq!(exit, ConsumerExit::SourceExhausted(AccountError::SourceClosed));
        assert!(health.current().is_stalled());

        let mut received = vec![];
        while let Ok(event) = rx.try_recv() {
            received.push(event.data1.as_i64().unwrap());
        }
        assert_eq!(received, (0..20).collect::<Vec<i64>>());
    }

    #[test]
    fn test_cancel_stops_an_idle_consumer() {
        let account = Arc::new(MemoryAccount::new());
        let (tx, _rx) = mpsc::channel(8);
        let (consumer, cancel, health) = consumer(&account, tx);

        let handle = consumer.spawn().unwrap();
        std::thread::sleep(Duration::from_millis(50));
        cancel.cancel();

        assert_eq!(handle.join().unwrap(), ConsumerExit::Cancelled);
        assert_eq!(health.current(), HealthState::Starting);
    }

    #[test]
    fn test_dropped_receiver_stops_consumer() {
        let account = Arc::new(MemoryAccount::new());
        account.emit(Event::info("nobody listens"));

        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let (consumer, _cancel, health) = consumer(&account, tx);

        assert_eq!(consumer.run(), ConsumerExit::DispatcherGone);
        assert!(health.current().is_stalled());
    }

    #[test]
    fn test_consumer_thread_is_named() {
        let account = Arc::new(MemoryAccount::new());
        account.close();
        let (tx, _rx) = mpsc::channel(8);
        let (consumer, _cancel, _health) = consumer(&account, tx);

        let handle = consumer.spawn().unwrap();
        assert_eq!(handle.thread().name(), Some(THREAD_NAME));
        handle.join().unwrap();
    }
}
