//! # Provider Service
//!
//! Concrete [`ItemProvider`] composing a [`StateMachine`], an [`ItemTree`]
//! and a [`SubscriptionRegistry`] around a connector's [`DataSource`].
//!
//! ## Locking
//!
//! - The tree sits behind a per-provider `RwLock`: browse/find/read share
//!   it, structural changes take it exclusively.
//! - Subscriptions use the registry's sharded per-item locks.
//! - Order is always tree → registry. Pruning releases the tree lock before
//!   invalidating subscriptions, and notify runs callbacks with no lock held.
//!
//! ## Async paths
//!
//! `browse_async`, `find_async` and `read_async` run on the blocking pool
//! and only hold `Arc` clones, so a caller that stops awaiting simply
//! drops the result. `read` and `read_async` share the `read_timeout`
//! bound: a source read that overruns it is a timeout on either path.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, ProviderConfig};
use crate::domain::fqn;
use crate::domain::{
    Item, ItemChange, ItemId, ItemTree, LifecycleError, NotifyReport, Observer, Payload,
    ProviderError, ReadError, SourceError, State, StateChange, StateMachine, StopType, Subscriber,
    SubscriptionRegistry, Transition,
};
use crate::metrics::{MetricsRecorder, NoOpMetrics};
use crate::ports::{DataSource, ItemProvider};

/// A connector hosted behind the [`ItemProvider`] contract.
pub struct Provider<S: DataSource> {
    name: String,
    config: ProviderConfig,
    source: Arc<S>,
    lifecycle: StateMachine,
    tree: Arc<RwLock<ItemTree>>,
    subscriptions: SubscriptionRegistry,
    metrics: Arc<dyn MetricsRecorder>,
}

impl<S: DataSource> Provider<S> {
    /// Create a provider named `name` over `source`.
    pub fn new(name: impl Into<String>, source: S, config: ProviderConfig) -> Result<Self, ConfigError> {
        Self::with_metrics(name, source, config, Arc::new(NoOpMetrics))
    }

    pub fn with_metrics(
        name: impl Into<String>,
        source: S,
        config: ProviderConfig,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        config.validate()?;

        let root_name = config.root_name.clone().unwrap_or_else(|| name.clone());
        let tree = ItemTree::new(root_name.as_str())
            .map_err(|_| ConfigError::InvalidRootName(root_name.clone()))?;

        debug!(provider = %name, root = %root_name, "Provider created");
        Ok(Self {
            lifecycle: StateMachine::with_metrics(
                name.clone(),
                metrics.clone(),
                config.catch_observer_panics,
            ),
            subscriptions: SubscriptionRegistry::with_metrics(
                metrics.clone(),
                config.catch_observer_panics,
            ),
            tree: Arc::new(RwLock::new(tree)),
            source: Arc::new(source),
            name,
            config,
            metrics,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Snapshot of a single item.
    pub fn item(&self, item: ItemId) -> Option<Item> {
        self.tree.read().get(item)
    }

    /// All leaf items, depth-first.
    pub fn leaves(&self) -> Vec<Item> {
        let tree = self.tree.read();
        tree.leaves(tree.root())
            .into_iter()
            .filter_map(|id| tree.get(id))
            .collect()
    }

    /// Number of distinct items with at least one subscriber.
    pub fn subscribed_items(&self) -> usize {
        self.subscriptions.len()
    }

    /// Attach a new item under `parent` (the root when `None`).
    pub fn add_item(&self, parent: Option<ItemId>, name: &str) -> Result<ItemId, ProviderError> {
        let mut tree = self.tree.write();
        let parent = parent.unwrap_or_else(|| tree.root());
        tree.add_child(parent, name)
            .map_err(|source| ProviderError::Tree {
                provider: self.name.clone(),
                source,
            })
    }

    /// Prune `item` and its subtree, invalidating every subscription on the
    /// removed items. Returns the removed ids; unknown ids remove nothing.
    pub fn remove_item(&self, item: ItemId) -> Result<Vec<ItemId>, ProviderError> {
        let removed = self
            .tree
            .write()
            .remove(item)
            .map_err(|source| ProviderError::Tree {
                provider: self.name.clone(),
                source,
            })?;
        let dropped = self.subscriptions.invalidate(&removed);
        debug!(provider = %self.name, removed = removed.len(), dropped, "Subtree pruned");
        Ok(removed)
    }

    /// Store `value` as the item's last-known value and notify its
    /// subscribers.
    pub fn publish(&self, item: ItemId, value: Payload) -> Result<NotifyReport, ProviderError> {
        let fqn = {
            let mut tree = self.tree.write();
            if !tree.set_value(item, value.clone()) {
                return Err(self.not_found(item));
            }
            tree.fqn(item).unwrap_or_default()
        };
        Ok(self.subscriptions.notify(&ItemChange { item, fqn, value }))
    }

    async fn connect_and_discover(&self) -> Result<(), SourceError> {
        self.source.connect().await?;

        let (removed, discovered) = {
            let mut tree = self.tree.write();
            let removed = tree.clear();
            let discovered = self.source.discover(&mut tree);
            if discovered.is_err() {
                tree.clear();
            }
            (removed, discovered)
        };
        self.subscriptions.invalidate(&removed);
        discovered?;

        info!(
            provider = %self.name,
            items = self.tree.read().len() - 1,
            "Namespace discovered"
        );
        Ok(())
    }

    async fn disconnect_and_prune(&self, stop_type: StopType) -> Result<(), SourceError> {
        self.source.disconnect(stop_type).await?;
        let removed = self.tree.write().clear();
        self.subscriptions.invalidate(&removed);
        Ok(())
    }

    fn snapshot(&self, item: ItemId) -> Result<Item, ProviderError> {
        self.tree.read().get(item).ok_or_else(|| self.not_found(item))
    }

    fn require_running(&self) -> Result<(), ProviderError> {
        match self.lifecycle.state() {
            State::Running => Ok(()),
            state => Err(ProviderError::NotRunning {
                provider: self.name.clone(),
                state,
            }),
        }
    }

    /// Apply the read timeout to a completed source read, so the sync and
    /// async paths return the same outcome for a slow source.
    fn within_deadline(
        &self,
        item: &Item,
        started: Instant,
        result: Result<Payload, ReadError>,
    ) -> Result<Payload, ReadError> {
        if started.elapsed() > self.config.read_timeout {
            return self.timed_out(item);
        }
        result
    }

    fn timed_out(&self, item: &Item) -> Result<Payload, ReadError> {
        warn!(
            provider = %self.name,
            fqn = %item.fqn,
            timeout = ?self.config.read_timeout,
            "Read timed out"
        );
        Err(ReadError::Timeout(self.config.read_timeout))
    }

    fn finish_read(
        &self,
        item: &Item,
        started: Instant,
        result: Result<Payload, ReadError>,
    ) -> Result<Payload, ProviderError> {
        self.metrics
            .record_read(&self.name, started.elapsed(), result.is_ok());
        result.map_err(|source| {
            debug!(provider = %self.name, fqn = %item.fqn, error = %source, "Read failed");
            ProviderError::Read {
                provider: self.name.clone(),
                fqn: item.fqn.clone(),
                source,
            }
        })
    }

    fn not_found(&self, item: ItemId) -> ProviderError {
        ProviderError::ItemNotFound {
            provider: self.name.clone(),
            item,
        }
    }

    fn internal(&self, operation: &'static str, err: impl std::fmt::Display) -> ProviderError {
        warn!(provider = %self.name, operation, error = %err, "Internal provider error");
        ProviderError::Internal {
            provider: self.name.clone(),
            operation,
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl<S: DataSource> ItemProvider for Provider<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> State {
        self.lifecycle.state()
    }

    fn on_state_changed(&self, observer: Observer<StateChange>) -> bool {
        self.lifecycle.on_state_changed(observer)
    }

    fn remove_state_observer(&self, observer: &Observer<StateChange>) -> bool {
        self.lifecycle.remove_state_observer(observer)
    }

    async fn start(&self) -> Result<Transition, LifecycleError> {
        self.lifecycle
            .start(|| self.connect_and_discover())
            .await
    }

    async fn stop(&self, stop_type: StopType) -> Result<Transition, LifecycleError> {
        self.lifecycle
            .stop(stop_type, |stop_type| self.disconnect_and_prune(stop_type))
            .await
    }

    async fn restart(&self, stop_type: StopType) -> Result<Transition, LifecycleError> {
        self.lifecycle
            .restart(
                stop_type,
                |stop_type| self.disconnect_and_prune(stop_type),
                || self.connect_and_discover(),
            )
            .await
    }

    fn root(&self) -> Item {
        self.tree.read().root_item()
    }

    fn browse(&self, item: Option<ItemId>) -> Vec<Item> {
        self.tree.read().browse(item)
    }

    fn find(&self, fqn: &str) -> Option<Item> {
        self.tree.read().find(fqn)
    }

    async fn browse_async(&self, item: Option<ItemId>) -> Result<Vec<Item>, ProviderError> {
        let tree = Arc::clone(&self.tree);
        tokio::task::spawn_blocking(move || tree.read().browse(item))
            .await
            .map_err(|e| self.internal("browse_async", e))
    }

    async fn find_async(&self, fqn: &str) -> Result<Option<Item>, ProviderError> {
        let tree = Arc::clone(&self.tree);
        let fqn = fqn.to_owned();
        tokio::task::spawn_blocking(move || tree.read().find(&fqn))
            .await
            .map_err(|e| self.internal("find_async", e))
    }

    fn subscribe(&self, item: ItemId, subscriber: Subscriber) -> Result<bool, ProviderError> {
        // Hold the tree read lock so the item cannot be pruned in between.
        let tree = self.tree.read();
        if !tree.contains(item) {
            return Err(self.not_found(item));
        }
        Ok(self.subscriptions.subscribe(item, subscriber))
    }

    fn unsubscribe(&self, item: ItemId, subscriber: &Subscriber) -> bool {
        self.subscriptions.unsubscribe(item, subscriber)
    }

    fn subscriber_count(&self, item: ItemId) -> usize {
        self.subscriptions.subscriber_count(item)
    }

    fn read(&self, item: ItemId) -> Result<Payload, ProviderError> {
        self.require_running()?;
        let snapshot = self.snapshot(item)?;
        let started = Instant::now();
        let result = self.source.read(&snapshot);
        let result = self.within_deadline(&snapshot, started, result);
        self.finish_read(&snapshot, started, result)
    }

    async fn read_async(&self, item: ItemId) -> Result<Payload, ProviderError> {
        self.require_running()?;
        let snapshot = self.snapshot(item)?;

        let source = Arc::clone(&self.source);
        let target = snapshot.clone();
        let started = Instant::now();
        let handle = tokio::task::spawn_blocking(move || source.read(&target));

        let result = match tokio::time::timeout(self.config.read_timeout, handle).await {
            Ok(Ok(result)) => self.within_deadline(&snapshot, started, result),
            Ok(Err(join)) => return Err(self.internal("read_async", join)),
            Err(_) => self.timed_out(&snapshot),
        };
        self.finish_read(&snapshot, started, result)
    }
}

/// Build a tree from root-relative FQNs; convenience for simple sources.
pub fn discover_paths<I, P>(tree: &mut ItemTree, paths: I) -> Result<(), SourceError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<str>,
{
    for path in paths {
        let path = path.as_ref();
        if fqn::segments(path).is_none() {
            return Err(SourceError::Discovery(format!("malformed path {:?}", path)));
        }
        tree.ensure_path(path)?;
    }
    Ok(())
}
