//! Adapters bridging the callback-based core to async consumers.

pub mod change_feed;

pub use change_feed::ChangeFeed;
