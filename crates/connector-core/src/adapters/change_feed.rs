//! # Change Feed
//!
//! Turns an item subscription into a bounded async channel.
//!
//! The forwarding callback never blocks the notifier: when the channel is
//! full (or the feed is gone) the change is dropped and reported back as a
//! subscriber failure in the provider's `NotifyReport`.

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::debug;

use crate::domain::{ItemChange, ItemId, ObserverError, ProviderError, Subscriber};
use crate::service::DynProvider;

/// A live subscription to one item, consumed as a stream of changes.
///
/// Dropping the feed unsubscribes it.
pub struct ChangeFeed {
    provider: DynProvider,
    item: ItemId,
    subscriber: Subscriber,
    receiver: mpsc::Receiver<ItemChange>,
}

impl ChangeFeed {
    /// Subscribe to `item` on `provider`, buffering up to `capacity` changes.
    pub fn attach(
        provider: DynProvider,
        item: ItemId,
        capacity: usize,
    ) -> Result<Self, ProviderError> {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let subscriber = Subscriber::new(move |change: &ItemChange| {
            sender.try_send(change.clone()).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ObserverError::failed("change feed full"),
                mpsc::error::TrySendError::Closed(_) => ObserverError::failed("change feed closed"),
            })
        });

        provider.subscribe(item, subscriber.clone())?;
        debug!(provider = %provider.name(), %item, capacity, "Change feed attached");
        Ok(Self {
            provider,
            item,
            subscriber,
            receiver,
        })
    }

    pub fn item(&self) -> ItemId {
        self.item
    }

    /// Wait for the next change.
    pub async fn recv(&mut self) -> Option<ItemChange> {
        self.receiver.recv().await
    }

    /// Next buffered change, if any.
    pub fn try_recv(&mut self) -> Option<ItemChange> {
        self.receiver.try_recv().ok()
    }
}

impl Stream for ChangeFeed {
    type Item = ItemChange;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for ChangeFeed {
    fn drop(&mut self) {
        self.provider.unsubscribe(self.item, &self.subscriber);
        debug!(provider = %self.provider.name(), item = %self.item, "Change feed dropped");
    }
}
