// ABOUTME: Health signal for the event pipeline, published over a watch channel.
// ABOUTME: Lets the host notice when message delivery has silently stopped.

use tokio::sync::watch;

/// Lifecycle state of the event pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthState {
    /// Built but not yet consuming
    Starting,
    /// Consumer and dispatcher are running
    Running,
    /// Shutdown requested; buffered events are being drained
    Draining,
    /// Pipeline finished after a requested shutdown
    Stopped,
    /// The event source failed; no more events will be delivered
    Stalled { reason: String },
}

impl HealthState {
    pub fn is_stalled(&self) -> bool {
        matches!(self, Self::Stalled { .. })
    }

    /// Whether the pipeline will never deliver another event
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Stalled { .. })
    }
}

/// Shared handle for reporting and observing pipeline health.
#[derive(Clone)]
pub struct PipelineHealth {
    tx: watch::Sender<HealthState>,
}

impl PipelineHealth {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(HealthState::Starting);
        Self { tx }
    }

    pub fn current(&self) -> HealthState {
        self.tx.borrow().clone()
    }

    /// Watch for state changes
    pub fn subscribe(&self) -> watch::Receiver<HealthState> {
        self.tx.subscribe()
    }

    pub fn mark_running(&self) {
        self.transition(HealthState::Running);
    }

    pub fn mark_draining(&self) {
        self.transition(HealthState::Draining);
    }

    pub fn mark_stopped(&self) {
        self.transition(HealthState::Stopped);
    }

    pub fn mark_stalled(&self, reason: impl Into<String>) {
        self.transition(HealthState::Stalled {
            reason: reason.into(),
        });
    }

    // Stalled is sticky: the drain that follows a source failure must not
    // report a clean stop.
    fn transition(&self, next: HealthState) {
        self.tx.send_if_modified(|state| {
            if state.is_stalled() || *state == next {
                return false;
            }
            tracing::debug!(from = ?state, to = ?next, "Pipeline health changed");
            *state = next;
            true
        });
    }
}

impl Default for PipelineHealth {
    fn default() -> Self {
        Self::new()
    }
}
