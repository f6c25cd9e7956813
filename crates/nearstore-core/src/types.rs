//! Domain types shared by the topology and the placement engine.
//!
//! Items are immutable once registered. Nodes are a tagged variant:
//! storage nodes hold items up to a capacity, client nodes declare which
//! items they are interested in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{CoreError, CoreResult};

/// Unique identifier for an item within one run.
pub type ItemId = u32;

/// Unique identifier for a node (storage or client) within one run.
pub type NodeId = u32;

// ── Items ─────────────────────────────────────────────────────────

/// A discrete piece of data to be placed on a storage node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    /// Space the item occupies on a storage node.
    pub size: u64,
}

/// Hands out item and node ids for a single run.
///
/// Replaces process-wide counters: each run owns its allocator, so two
/// scenarios built side by side never share id space.
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    next_item: ItemId,
    next_node: NodeId,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_item_id(&mut self) -> ItemId {
        let id = self.next_item;
        self.next_item += 1;
        id
    }

    pub fn next_node_id(&mut self) -> NodeId {
        let id = self.next_node;
        self.next_node += 1;
        id
    }
}

/// Id → item lookup owned by the run context.
#[derive(Debug, Default, Clone)]
pub struct ItemRegistry {
    items: BTreeMap<ItemId, Item>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh id and register an item of the given size.
    pub fn create(&mut self, ids: &mut IdAllocator, size: u64) -> Item {
        let item = Item {
            id: ids.next_item_id(),
            size,
        };
        self.items.insert(item.id, item);
        item
    }

    /// Register an item with a caller-chosen id.
    pub fn insert(&mut self, item: Item) -> CoreResult<()> {
        if self.items.contains_key(&item.id) {
            return Err(CoreError::DuplicateItem(item.id));
        }
        self.items.insert(item.id, item);
        Ok(())
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.items.get(&id)
    }

    /// Like [`get`](Self::get), but unknown ids are an error.
    pub fn lookup(&self, id: ItemId) -> CoreResult<&Item> {
        self.items.get(&id).ok_or(CoreError::UnknownItem(id))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Item> {
        self.items.values()
    }
}

// ── Nodes ─────────────────────────────────────────────────────────

/// A network endpoint with finite capacity that holds items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageNode {
    pub id: NodeId,
    pub capacity: u64,
    /// Items currently held, in insertion order.
    pub stored: Vec<ItemId>,
}

impl StorageNode {
    pub fn new(id: NodeId, capacity: u64) -> Self {
        Self {
            id,
            capacity,
            stored: Vec::new(),
        }
    }

    /// Total size of the stored items.
    pub fn used(&self, items: &ItemRegistry) -> CoreResult<u64> {
        self.stored
            .iter()
            .map(|id| items.lookup(*id).map(|item| item.size))
            .sum()
    }

    pub fn free(&self, items: &ItemRegistry) -> CoreResult<u64> {
        Ok(self.capacity.saturating_sub(self.used(items)?))
    }
}

/// A consumer interested in a set of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientNode {
    pub id: NodeId,
    /// Distinct item ids, in declaration order.
    pub interests: Vec<ItemId>,
}

impl ClientNode {
    /// Build a client; repeated interests are dropped, first occurrence wins.
    pub fn new(id: NodeId, interests: impl IntoIterator<Item = ItemId>) -> Self {
        let mut seen = Vec::new();
        for item in interests {
            if !seen.contains(&item) {
                seen.push(item);
            }
        }
        Self {
            id,
            interests: seen,
        }
    }

    pub fn is_interested_in(&self, item: ItemId) -> bool {
        self.interests.contains(&item)
    }
}

/// A vertex of the topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Storage(StorageNode),
    Client(ClientNode),
}

impl Node {
    pub fn storage(id: NodeId, capacity: u64) -> Self {
        Node::Storage(StorageNode::new(id, capacity))
    }

    pub fn client(id: NodeId, interests: impl IntoIterator<Item = ItemId>) -> Self {
        Node::Client(ClientNode::new(id, interests))
    }

    pub fn id(&self) -> NodeId {
        match self {
            Node::Storage(s) => s.id,
            Node::Client(c) => c.id,
        }
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Node::Storage(_))
    }

    pub fn is_client(&self) -> bool {
        matches!(self, Node::Client(_))
    }

    pub fn as_storage(&self) -> Option<&StorageNode> {
        match self {
            Node::Storage(s) => Some(s),
            Node::Client(_) => None,
        }
    }

    pub fn as_storage_mut(&mut self) -> Option<&mut StorageNode> {
        match self {
            Node::Storage(s) => Some(s),
            Node::Client(_) => None,
        }
    }

    pub fn as_client(&self) -> Option<&ClientNode> {
        match self {
            Node::Client(c) => Some(c),
            Node::Storage(_) => None,
        }
    }
}
