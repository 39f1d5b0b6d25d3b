//! Item identity and the snapshots handed out by browse/find.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Connector-specific payload carried by items and change notifications.
pub type Payload = serde_json::Value;

/// Process-unique item identity, assigned once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Owned, point-in-time view of a tree node.
///
/// Snapshots are detached from the tree: holding one never blocks mutation,
/// and the `guid` stays valid for identity comparison after the node is gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub guid: ItemId,
    pub name: String,
    /// Dot-joined path from the root, root name included.
    pub fqn: String,
    pub parent: Option<ItemId>,
    pub child_count: usize,
    /// Last-known value, if the provider has published one.
    pub value: Option<Payload>,
}

impl Item {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.child_count == 0
    }
}

/// Change notification delivered to item subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemChange {
    pub item: ItemId,
    pub fqn: String,
    pub value: Payload,
}
