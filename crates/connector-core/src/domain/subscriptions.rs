//! # Subscription Registry
//!
//! Maps item identity to an ordered list of subscriber callbacks.
//!
//! Entries live in a sharded [`DashMap`], so subscribe/unsubscribe/notify on
//! unrelated items contend only when they hash to the same shard. An entry
//! is created by the first subscription and pruned as soon as its last
//! subscriber leaves.
//!
//! `notify` copies the subscriber list under the shard lock and releases it
//! before invoking anything. Callbacks therefore never run while a registry
//! lock is held, which keeps the tree-lock/registry-lock ordering safe.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use super::errors::{ObserverFailure, ObserverFailures};
use super::item::{ItemChange, ItemId};
use super::observers::{fan_out, Observer};
use crate::metrics::{MetricsRecorder, NoOpMetrics, SubscriptionEvent};

/// Callback invoked with every change of a subscribed item.
pub type Subscriber = Observer<ItemChange>;

/// Outcome of one `notify` fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyReport {
    pub item: ItemId,
    /// Callbacks that completed without error.
    pub delivered: usize,
    pub failures: Vec<ObserverFailure>,
}

impl NotifyReport {
    /// Total callbacks invoked.
    pub fn attempted(&self) -> usize {
        self.delivered + self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Collapse into the delivered count, or the aggregated failures.
    pub fn into_result(self) -> Result<usize, ObserverFailures> {
        if self.failures.is_empty() {
            Ok(self.delivered)
        } else {
            Err(ObserverFailures(self.failures))
        }
    }
}

/// Concurrency-safe registry of item subscriptions.
pub struct SubscriptionRegistry {
    entries: DashMap<ItemId, Vec<Subscriber>>,
    catch_panics: bool,
    metrics: Arc<dyn MetricsRecorder>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::with_metrics(Arc::new(NoOpMetrics), true)
    }

    pub fn with_metrics(metrics: Arc<dyn MetricsRecorder>, catch_panics: bool) -> Self {
        Self {
            entries: DashMap::new(),
            catch_panics,
            metrics,
        }
    }

    /// Register `subscriber` for `item`.
    ///
    /// Returns `false`, leaving the registry untouched, if this exact
    /// subscriber is already registered for the item.
    pub fn subscribe(&self, item: ItemId, subscriber: Subscriber) -> bool {
        let mut entry = self.entries.entry(item).or_default();
        if entry.iter().any(|s| s.same_as(&subscriber)) {
            drop(entry);
            debug!(item = %item, "Duplicate subscription rejected");
            self.metrics.record_subscription(SubscriptionEvent::Rejected);
            return false;
        }
        entry.push(subscriber);
        let count = entry.len();
        drop(entry);

        debug!(item = %item, subscribers = count, "Subscription added");
        self.metrics.record_subscription(SubscriptionEvent::Added);
        true
    }

    /// Remove `subscriber` from `item`.
    ///
    /// Unknown items and unknown subscribers are a no-op; the return value
    /// only says whether something was removed.
    pub fn unsubscribe(&self, item: ItemId, subscriber: &Subscriber) -> bool {
        let removed = match self.entries.get_mut(&item) {
            Some(mut entry) => {
                let before = entry.len();
                entry.retain(|s| !s.same_as(subscriber));
                entry.len() != before
            }
            None => false,
        };
        // Prune atomically: a concurrent subscribe may have refilled the entry.
        self.entries.remove_if(&item, |_, subs| subs.is_empty());

        if removed {
            debug!(item = %item, "Subscription removed");
            self.metrics.record_subscription(SubscriptionEvent::Removed);
        }
        removed
    }

    /// Deliver `change` to every subscriber of `change.item`, in
    /// registration order. Failures are collected, never propagated
    /// mid-fan-out.
    pub fn notify(&self, change: &ItemChange) -> NotifyReport {
        let snapshot = self
            .entries
            .get(&change.item)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        let failures = fan_out(&snapshot, change, self.catch_panics);
        let delivered = snapshot.len() - failures.len();

        if !failures.is_empty() {
            warn!(
                item = %change.item,
                fqn = %change.fqn,
                failed = failures.len(),
                delivered,
                "Subscriber callbacks failed during notify"
            );
        }
        self.metrics.record_notification(delivered, failures.len());

        NotifyReport {
            item: change.item,
            delivered,
            failures,
        }
    }

    pub fn subscriber_count(&self, item: ItemId) -> usize {
        self.entries.get(&item).map_or(0, |entry| entry.len())
    }

    pub fn is_subscribed(&self, item: ItemId, subscriber: &Subscriber) -> bool {
        self.entries
            .get(&item)
            .is_some_and(|entry| entry.iter().any(|s| s.same_as(subscriber)))
    }

    /// Number of distinct items with at least one subscriber.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every subscription held on the given items.
    ///
    /// Returns the number of subscriptions dropped.
    pub fn invalidate(&self, items: &[ItemId]) -> usize {
        let dropped: usize = items
            .iter()
            .filter_map(|item| self.entries.remove(item))
            .map(|(_, subs)| subs.len())
            .sum();
        if dropped > 0 {
            debug!(items = items.len(), dropped, "Subscriptions invalidated");
            self.metrics
                .record_subscription(SubscriptionEvent::Invalidated(dropped));
        }
        dropped
    }

    /// Drop everything. Returns the number of subscriptions dropped.
    pub fn clear(&self) -> usize {
        let items: Vec<ItemId> = self.entries.iter().map(|e| *e.key()).collect();
        self.invalidate(&items)
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
