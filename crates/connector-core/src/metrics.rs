//! Metrics hooks for lifecycle, subscription, read and install operations.
//!
//! The core only records through [`MetricsRecorder`]. [`Metrics`] keeps
//! in-process counters; exporters (Prometheus, ...) implement the trait in
//! their own crates.
//!
//! ## Usage
//!
//! ```ignore
//! use connector_core::metrics::Metrics;
//!
//! let metrics = Arc::new(Metrics::new());
//! let provider = Provider::with_metrics("plc1", source, config, metrics.clone())?;
//! // ...
//! println!("{:?}", metrics.snapshot());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::domain::state::State;

/// Subscription bookkeeping events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionEvent {
    Added,
    /// Duplicate subscribe attempt.
    Rejected,
    Removed,
    /// Subscriptions dropped because their items were pruned.
    Invalidated(usize),
}

/// Trait for custom metrics recording implementations.
pub trait MetricsRecorder: Send + Sync {
    /// Record one state transition of a component.
    fn record_transition(&self, component: &str, from: State, to: State);

    fn record_subscription(&self, event: SubscriptionEvent);

    /// Record the outcome of one notify fan-out.
    fn record_notification(&self, delivered: usize, failed: usize);

    /// Record a completed read and its latency.
    fn record_read(&self, provider: &str, duration: Duration, ok: bool);

    /// Record an install attempt; `accepted` is false when the guard rejected it.
    fn record_install(&self, accepted: bool);
}

/// In-process counters.
#[derive(Default)]
pub struct Metrics {
    pub transitions: AtomicU64,
    pub faults: AtomicU64,
    pub subscriptions_added: AtomicU64,
    pub subscriptions_rejected: AtomicU64,
    pub subscriptions_removed: AtomicU64,
    pub subscriptions_invalidated: AtomicU64,
    pub notifications_delivered: AtomicU64,
    pub notifications_failed: AtomicU64,
    pub reads_ok: AtomicU64,
    pub reads_failed: AtomicU64,
    /// Cumulative read time in nanoseconds
    pub read_time_ns: AtomicU64,
    pub installs_accepted: AtomicU64,
    pub installs_rejected: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            transitions: self.transitions.load(Ordering::Relaxed),
            faults: self.faults.load(Ordering::Relaxed),
            subscriptions_added: self.subscriptions_added.load(Ordering::Relaxed),
            subscriptions_rejected: self.subscriptions_rejected.load(Ordering::Relaxed),
            subscriptions_removed: self.subscriptions_removed.load(Ordering::Relaxed),
            subscriptions_invalidated: self.subscriptions_invalidated.load(Ordering::Relaxed),
            notifications_delivered: self.notifications_delivered.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
            reads_ok: self.reads_ok.load(Ordering::Relaxed),
            reads_failed: self.reads_failed.load(Ordering::Relaxed),
            avg_read_ns: self.avg_read_time_ns(),
            installs_accepted: self.installs_accepted.load(Ordering::Relaxed),
            installs_rejected: self.installs_rejected.load(Ordering::Relaxed),
        }
    }

    /// Average read latency in nanoseconds
    pub fn avg_read_time_ns(&self) -> u64 {
        let total = self.read_time_ns.load(Ordering::Relaxed);
        let count =
            self.reads_ok.load(Ordering::Relaxed) + self.reads_failed.load(Ordering::Relaxed);
        if count > 0 {
            total / count
        } else {
            0
        }
    }
}

impl MetricsRecorder for Metrics {
    fn record_transition(&self, _component: &str, _from: State, to: State) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
        if to == State::Faulted {
            self.faults.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_subscription(&self, event: SubscriptionEvent) {
        match event {
            SubscriptionEvent::Added => {
                self.subscriptions_added.fetch_add(1, Ordering::Relaxed);
            }
            SubscriptionEvent::Rejected => {
                self.subscriptions_rejected.fetch_add(1, Ordering::Relaxed);
            }
            SubscriptionEvent::Removed => {
                self.subscriptions_removed.fetch_add(1, Ordering::Relaxed);
            }
            SubscriptionEvent::Invalidated(n) => {
                self.subscriptions_invalidated
                    .fetch_add(n as u64, Ordering::Relaxed);
            }
        }
    }

    fn record_notification(&self, delivered: usize, failed: usize) {
        self.notifications_delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.notifications_failed
            .fetch_add(failed as u64, Ordering::Relaxed);
    }

    fn record_read(&self, _provider: &str, duration: Duration, ok: bool) {
        if ok {
            self.reads_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.reads_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.read_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    fn record_install(&self, accepted: bool) {
        if accepted {
            self.installs_accepted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.installs_rejected.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Point-in-time metrics snapshot
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub transitions: u64,
    pub faults: u64,
    pub subscriptions_added: u64,
    pub subscriptions_rejected: u64,
    pub subscriptions_removed: u64,
    pub subscriptions_invalidated: u64,
    pub notifications_delivered: u64,
    pub notifications_failed: u64,
    pub reads_ok: u64,
    pub reads_failed: u64,
    pub avg_read_ns: u64,
    pub installs_accepted: u64,
    pub installs_rejected: u64,
}

/// No-op metrics recorder for when metrics are disabled
#[derive(Default, Clone, Copy)]
pub struct NoOpMetrics;

impl MetricsRecorder for NoOpMetrics {
    fn record_transition(&self, _component: &str, _from: State, _to: State) {}
    fn record_subscription(&self, _event: SubscriptionEvent) {}
    fn record_notification(&self, _delivered: usize, _failed: usize) {}
    fn record_read(&self, _provider: &str, _duration: Duration, _ok: bool) {}
    fn record_install(&self, _accepted: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.record_transition("plc", State::Starting, State::Running);
        metrics.record_transition("plc", State::Starting, State::Faulted);
        metrics.record_subscription(SubscriptionEvent::Added);
        metrics.record_subscription(SubscriptionEvent::Invalidated(3));
        metrics.record_notification(2, 1);
        metrics.record_read("plc", Duration::from_nanos(100), true);
        metrics.record_read("plc", Duration::from_nanos(300), false);
        metrics.record_install(false);

        let snap = metrics.snapshot();
        assert_eq!(snap.transitions, 2);
        assert_eq!(snap.faults, 1);
        assert_eq!(snap.subscriptions_added, 1);
        assert_eq!(snap.subscriptions_invalidated, 3);
        assert_eq!(snap.notifications_delivered, 2);
        assert_eq!(snap.notifications_failed, 1);
        assert_eq!(snap.avg_read_ns, 200);
        assert_eq!(snap.installs_rejected, 1);
    }
}
