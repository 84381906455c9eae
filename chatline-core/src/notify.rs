// ABOUTME: Fan-out of resolved "new message" notifications to subscribers.
// ABOUTME: Each subscriber runs in turn under a timeout; its failures are logged and contained.

use anyhow::Result;
use async_trait::async_trait;
use chatline_account::Message;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::metrics;

/// Receives every resolved incoming message.
///
/// Called inline on the delivery context: implementations must return
/// promptly and must cope with messages for chats they are not showing.
#[async_trait]
pub trait MessageSubscriber: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str {
        "subscriber"
    }

    async fn on_new_message(&self, message: &Message) -> Result<()>;
}

/// Adapter so plain closures can subscribe
struct FnSubscriber<F> {
    f: F,
}

#[async_trait]
impl<F> MessageSubscriber for FnSubscriber<F>
where
    F: Fn(&Message) + Send + Sync,
{
    fn name(&self) -> &str {
        "callback"
    }

    async fn on_new_message(&self, message: &Message) -> Result<()> {
        (self.f)(message);
        Ok(())
    }
}

/// Publishes "new message" notifications to all registered subscribers.
pub struct NewMessageHub {
    subscribers: RwLock<Vec<Arc<dyn MessageSubscriber>>>,
    timeout: Duration,
}

impl NewMessageHub {
    /// Create a hub that gives each subscriber at most `timeout` per message
    pub fn new(timeout: Duration) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            timeout,
        }
    }

    pub fn subscribe(&self, subscriber: Arc<dyn MessageSubscriber>) {
        tracing::debug!(subscriber = subscriber.name(), "Subscriber registered");
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(subscriber);
    }

    /// Register a closure for new-message notifications
    pub fn on_new_message<F>(&self, f: F)
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnSubscriber { f }));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Notify every subscriber in registration order.
    ///
    /// Returns how many subscribers handled the message successfully.
    pub async fn publish(&self, message: &Message) -> usize {
        // Snapshot so the lock is not held across awaits
        let subscribers: Vec<Arc<dyn MessageSubscriber>> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();

        let mut delivered = 0;
        for subscriber in subscribers {
            let call = AssertUnwindSafe(subscriber.on_new_message(message)).catch_unwind();
            match tokio::time::timeout(self.timeout, call).await {
                Ok(Ok(Ok(()))) => {
                    metrics::record_notification("ok");
                    delivered += 1;
                }
                Ok(Ok(Err(e))) => {
                    metrics::record_notification("error");
                    tracing::warn!(
                        subscriber = subscriber.name(),
                        msg_id = %message.id,
                        error = %e,
                        "Subscriber failed to handle new message"
                    );
                }
                Ok(Err(_panic)) => {
                    metrics::record_notification("panic");
                    tracing::error!(
                        subscriber = subscriber.name(),
                        msg_id = %message.id,
                        "Subscriber panicked while handling new message"
                    );
                }
                Err(_) => {
                    metrics::record_notification("timeout");
                    tracing::warn!(
                        subscriber = subscriber.name(),
                        msg_id = %message.id,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Subscriber timed out handling new message"
                    );
                }
            }
        }
        delivered
    }
}
