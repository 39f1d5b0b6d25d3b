//! # Item Tree
//!
//! Arena of item nodes keyed by [`ItemId`]. Children are owned through the
//! arena and kept in insertion order; the parent link is a plain id, so
//! there is no ownership cycle and pruning a subtree is a matter of
//! removing its ids.
//!
//! ## Invariants
//!
//! - Every non-root node has exactly one parent and appears exactly once in
//!   that parent's child list.
//! - Sibling names are unique and valid FQN segments.
//! - `find(fqn(id)) == id` for every node reachable from the root.

use std::collections::HashMap;

use super::errors::TreeError;
use super::fqn;
use super::item::{Item, ItemId, Payload};

#[derive(Debug, Clone)]
struct Node {
    name: String,
    parent: Option<ItemId>,
    children: Vec<ItemId>,
    value: Option<Payload>,
}

/// Ownership hierarchy of addressable items under a single root.
#[derive(Debug, Clone)]
pub struct ItemTree {
    root: ItemId,
    nodes: HashMap<ItemId, Node>,
}

impl ItemTree {
    /// Create a tree containing only a root named `root_name`.
    pub fn new(root_name: impl Into<String>) -> Result<Self, TreeError> {
        let root_name = root_name.into();
        fqn::validate_name(&root_name)?;

        let root = ItemId::generate();
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            Node {
                name: root_name,
                parent: None,
                children: Vec::new(),
                value: None,
            },
        );
        Ok(Self { root, nodes })
    }

    pub fn root(&self) -> ItemId {
        self.root
    }

    pub fn root_name(&self) -> &str {
        &self.nodes[&self.root].name
    }

    /// Snapshot of the root, which always exists.
    pub fn root_item(&self) -> Item {
        let node = &self.nodes[&self.root];
        Item {
            guid: self.root,
            name: node.name.clone(),
            fqn: node.name.clone(),
            parent: None,
            child_count: node.children.len(),
            value: node.value.clone(),
        }
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the tree holds nothing but its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Attach a new child named `name` under `parent`.
    ///
    /// Fails if the parent is unknown, the name is invalid, or a sibling
    /// already carries the name. Nothing changes on failure.
    pub fn add_child(&mut self, parent: ItemId, name: impl Into<String>) -> Result<ItemId, TreeError> {
        let name = name.into();
        fqn::validate_name(&name)?;

        if !self.nodes.contains_key(&parent) {
            return Err(TreeError::UnknownParent(parent));
        }
        if self.child_by_name(parent, &name).is_some() {
            return Err(TreeError::DuplicateName {
                parent: self.fqn(parent).unwrap_or_default(),
                name,
            });
        }

        let id = ItemId::generate();
        self.nodes.insert(
            id,
            Node {
                name,
                parent: Some(parent),
                children: Vec::new(),
                value: None,
            },
        );
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(id);
        }
        Ok(id)
    }

    /// Ensure every segment of a root-relative path exists, creating the
    /// missing ones in order. Returns the id of the last segment.
    pub fn ensure_path(&mut self, relative: &str) -> Result<ItemId, TreeError> {
        let segments = fqn::segments(relative).ok_or_else(|| TreeError::InvalidName {
            name: relative.to_string(),
        })?;

        let mut current = self.root;
        for segment in segments {
            current = match self.child_by_name(current, segment) {
                Some(existing) => existing,
                None => self.add_child(current, segment)?,
            };
        }
        Ok(current)
    }

    /// Direct child of `parent` with the given name.
    pub fn child_by_name(&self, parent: ItemId, name: &str) -> Option<ItemId> {
        self.nodes
            .get(&parent)?
            .children
            .iter()
            .copied()
            .find(|child| self.nodes.get(child).is_some_and(|n| n.name == name))
    }

    /// Snapshot of a node.
    pub fn get(&self, id: ItemId) -> Option<Item> {
        let node = self.nodes.get(&id)?;
        Some(Item {
            guid: id,
            name: node.name.clone(),
            fqn: self.fqn(id)?,
            parent: node.parent,
            child_count: node.children.len(),
            value: node.value.clone(),
        })
    }

    /// Fully-qualified name of a node.
    pub fn fqn(&self, id: ItemId) -> Option<String> {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.nodes.get(&current)?;
            names.push(node.name.as_str());
            cursor = node.parent;
        }
        names.reverse();
        Some(fqn::join(names))
    }

    /// Resolve an FQN to a node id.
    ///
    /// The path is first tried as given, with its first segment naming the
    /// root. If that misses, the whole path is retried relative to the root,
    /// so both `Root.A.B` and `A.B` resolve.
    pub fn find_id(&self, path: &str) -> Option<ItemId> {
        let segments = fqn::segments(path)?;

        if let Some((first, rest)) = segments.split_first() {
            if *first == self.root_name() {
                if let Some(found) = self.walk(self.root, rest) {
                    return Some(found);
                }
            }
        }
        self.walk(self.root, &segments)
    }

    /// Resolve an FQN to a snapshot. Absence is a normal result.
    pub fn find(&self, path: &str) -> Option<Item> {
        self.find_id(path).and_then(|id| self.get(id))
    }

    fn walk(&self, from: ItemId, segments: &[&str]) -> Option<ItemId> {
        segments
            .iter()
            .try_fold(from, |current, segment| self.child_by_name(current, segment))
    }

    /// Immediate children of `id` (the root if `None`), in insertion order.
    ///
    /// Unknown ids and leaves both yield an empty list.
    pub fn browse(&self, id: Option<ItemId>) -> Vec<Item> {
        let id = id.unwrap_or(self.root);
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        node.children
            .iter()
            .filter_map(|child| self.get(*child))
            .collect()
    }

    /// All nodes below `id` in depth-first pre-order, `id` excluded.
    pub fn descendants(&self, id: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let Some(node) = self.nodes.get(&id) else {
            return out;
        };
        let mut stack: Vec<ItemId> = node.children.iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Nodes below `id` that have no children.
    pub fn leaves(&self, id: ItemId) -> Vec<ItemId> {
        self.descendants(id)
            .into_iter()
            .filter(|d| self.nodes.get(d).is_some_and(|n| n.children.is_empty()))
            .collect()
    }

    /// Detach and destroy `id` and its whole subtree.
    ///
    /// Returns every removed id (the node first). Unknown ids remove nothing.
    pub fn remove(&mut self, id: ItemId) -> Result<Vec<ItemId>, TreeError> {
        if id == self.root {
            return Err(TreeError::CannotRemoveRoot);
        }
        let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent) else {
            return Ok(Vec::new());
        };
        if let Some(parent) = self.nodes.get_mut(&parent) {
            parent.children.retain(|child| *child != id);
        }

        let mut removed = vec![id];
        removed.extend(self.descendants(id));
        for gone in &removed {
            self.nodes.remove(gone);
        }
        Ok(removed)
    }

    /// Remove everything below the root. Returns the removed ids.
    pub fn clear(&mut self) -> Vec<ItemId> {
        let root = self.root;
        let removed = self.descendants(root);
        self.nodes.retain(|id, _| *id == root);
        if let Some(root) = self.nodes.get_mut(&root) {
            root.children.clear();
            root.value = None;
        }
        removed
    }

    /// Store the last-known value. Returns `false` for unknown ids.
    pub fn set_value(&mut self, id: ItemId, value: Payload) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) => {
                node.value = Some(value);
                true
            }
            None => false,
        }
    }

    pub fn value(&self, id: ItemId) -> Option<&Payload> {
        self.nodes.get(&id)?.value.as_ref()
    }
}
