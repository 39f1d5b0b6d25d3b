//! Change detection: periodically read every leaf and publish the values
//! that moved.

use std::sync::Arc;
use std::time::Duration;

use connector_core::{DataSource, ItemProvider, Provider, ProviderError, State};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Outcome of one polling pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollStats {
    pub polled: usize,
    pub published: usize,
    pub failed: usize,
    /// Subscriber callbacks that failed while publishing.
    pub delivery_failures: usize,
}

/// Read every leaf of `provider` once and publish changed values.
///
/// A provider that is not running is skipped entirely.
pub async fn poll_once<S: DataSource>(provider: &Provider<S>) -> PollStats {
    let mut stats = PollStats::default();
    if provider.state() != State::Running {
        return stats;
    }

    for leaf in provider.leaves() {
        stats.polled += 1;
        let value = match provider.read_async(leaf.guid).await {
            Ok(value) => value,
            // Pruned between enumeration and read.
            Err(ProviderError::ItemNotFound { .. }) => continue,
            Err(e) => {
                stats.failed += 1;
                debug!(provider = %provider.name(), fqn = %leaf.fqn, error = %e, "Poll read failed");
                continue;
            }
        };
        if leaf.value.as_ref() == Some(&value) {
            continue;
        }
        match provider.publish(leaf.guid, value) {
            Ok(report) => {
                stats.published += 1;
                stats.delivery_failures += report.failures.len();
            }
            Err(e) => debug!(provider = %provider.name(), fqn = %leaf.fqn, error = %e, "Publish skipped"),
        }
    }
    stats
}

/// Poll `provider` every `interval` until `shutdown` flips to `true`.
pub async fn run_poller<S: DataSource>(
    provider: Arc<Provider<S>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    info!(provider = %provider.name(), interval = ?interval, "Poller started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let stats = poll_once(&provider).await;
                if stats.failed > 0 || stats.delivery_failures > 0 {
                    warn!(
                        provider = %provider.name(),
                        failed = stats.failed,
                        delivery_failures = stats.delivery_failures,
                        "Poll pass completed with failures"
                    );
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!(provider = %provider.name(), "Poller stopped");
}
