//! Inbound Ports (Driving Ports)
//!
//! The contract the hosting platform and external callers (management API,
//! change-detection loops) use to drive a connector.

use async_trait::async_trait;

use crate::domain::{
    Item, ItemId, LifecycleError, Observer, Payload, ProviderError, State, StateChange, StopType,
    Subscriber, Transition,
};

/// A connector exposing one item tree behind the lifecycle contract.
///
/// All methods may be called concurrently from arbitrary threads.
#[async_trait]
pub trait ItemProvider: Send + Sync {
    /// Unique key of the provider within the hosting directory.
    fn name(&self) -> &str;

    /// Current lifecycle state. Never blocks.
    fn state(&self) -> State;

    /// Register a `StateChanged` observer. `false` if already registered.
    fn on_state_changed(&self, observer: Observer<StateChange>) -> bool;

    fn remove_state_observer(&self, observer: &Observer<StateChange>) -> bool;

    async fn start(&self) -> Result<Transition, LifecycleError>;

    async fn stop(&self, stop_type: StopType) -> Result<Transition, LifecycleError>;

    async fn restart(&self, stop_type: StopType) -> Result<Transition, LifecycleError>;

    /// Snapshot of the root item.
    fn root(&self) -> Item;

    /// Immediate children of `item`, or of the root when `None`.
    fn browse(&self, item: Option<ItemId>) -> Vec<Item>;

    /// Resolve a fully-qualified or root-relative name.
    fn find(&self, fqn: &str) -> Option<Item>;

    /// Same as [`browse`](Self::browse), without blocking the caller.
    async fn browse_async(&self, item: Option<ItemId>) -> Result<Vec<Item>, ProviderError>;

    /// Same as [`find`](Self::find), without blocking the caller.
    async fn find_async(&self, fqn: &str) -> Result<Option<Item>, ProviderError>;

    /// Subscribe to changes of `item`.
    ///
    /// `Ok(false)` if this subscriber is already registered for the item.
    fn subscribe(&self, item: ItemId, subscriber: Subscriber) -> Result<bool, ProviderError>;

    /// Remove a subscription. Unknown pairs are a no-op returning `false`.
    fn unsubscribe(&self, item: ItemId, subscriber: &Subscriber) -> bool;

    fn subscriber_count(&self, item: ItemId) -> usize;

    /// Read the current value from the source.
    fn read(&self, item: ItemId) -> Result<Payload, ProviderError>;

    /// Same outcome as [`read`](Self::read), delivered without blocking.
    async fn read_async(&self, item: ItemId) -> Result<Payload, ProviderError>;
}
