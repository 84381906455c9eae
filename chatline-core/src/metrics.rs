// ABOUTME: Pipeline counters recorded through the metrics facade.
// ABOUTME: No recorder is installed by default; hosts opt in by installing one.

use metrics::counter;

pub const EVENTS_CONSUMED: &str = "chatline_events_consumed_total";
pub const EVENTS_DISPATCHED: &str = "chatline_events_dispatched_total";
pub const NOTIFICATIONS: &str = "chatline_notifications_total";

/// An event was taken from the account's event source
pub fn record_event_consumed() {
    counter!(EVENTS_CONSUMED).increment(1);
}

/// An event left the dispatcher with the given outcome
pub fn record_dispatch(kind: &str, outcome: &'static str) {
    counter!(EVENTS_DISPATCHED, "kind" => kind.to_string(), "outcome" => outcome).increment(1);
}

/// A subscriber was notified ("ok", "error", "panic", "timeout")
pub fn record_notification(outcome: &'static str) {
    counter!(NOTIFICATIONS, "outcome" => outcome).increment(1);
}
