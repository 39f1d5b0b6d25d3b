//! Outbound Ports (Driven Ports)
//!
//! What a connector implementation supplies to the core. Everything else
//! (lifecycle bookkeeping, the namespace, subscriptions, async read
//! plumbing) is provided by [`Provider`](crate::service::Provider).

use async_trait::async_trait;

use crate::domain::{Item, ItemTree, Payload, ReadError, SourceError, StopType};

/// An external data source (PLC, sensor gateway, historian, ...).
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Open the connection. Runs while the provider is `Starting`.
    async fn connect(&self) -> Result<(), SourceError>;

    /// Close the connection. Runs while the provider is `Stopping`.
    async fn disconnect(&self, stop_type: StopType) -> Result<(), SourceError>;

    /// Populate the namespace below `tree.root()`.
    ///
    /// Called right after a successful `connect`, on an empty tree.
    fn discover(&self, tree: &mut ItemTree) -> Result<(), SourceError>;

    /// Fetch the current value of `item`.
    ///
    /// May block; the async read path runs it off the caller's task.
    fn read(&self, item: &Item) -> Result<Payload, ReadError>;
}
