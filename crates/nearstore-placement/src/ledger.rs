//! Capacity ledger: per-node used/free space and item locations.
//!
//! Strategies never touch the topology directly. They work on a ledger
//! seeded from each storage node's current contents and commit it back
//! only once every item is placed, so a failed run leaves the topology as
//! it was. Mutation goes through `&mut self`: one mutator at a time.
//!
//! Items found on a node when the ledger is seeded are pinned there:
//! they can't be evicted, and settling a node only chooses among the
//! items this run put on it.

use std::collections::BTreeMap;

use tracing::debug;

use nearstore_core::{Item, ItemId, ItemRegistry, NodeId};
use nearstore_topology::{Topology, TopologyError};

use crate::error::{PlacementError, PlacementResult};
use crate::knapsack::{self, KnapsackEntry};

/// Space accounting for one storage node.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LedgerEntry {
    capacity: u64,
    /// Wider than any single size: optimistic placement may overcommit a
    /// node past `u64::MAX`.
    used: u128,
    stored: Vec<ItemId>,
}

impl LedgerEntry {
    fn free(&self) -> u64 {
        // Never above `capacity`, so it fits back in a u64.
        u128::from(self.capacity).saturating_sub(self.used) as u64
    }

    fn is_overcommitted(&self) -> bool {
        self.used > u128::from(self.capacity)
    }
}

/// Working copy of every storage node's contents for one placement run.
#[derive(Debug, Clone)]
pub struct CapacityLedger<'r> {
    items: &'r ItemRegistry,
    nodes: BTreeMap<NodeId, LedgerEntry>,
    locations: BTreeMap<ItemId, NodeId>,
    /// Where each item was when the ledger was seeded.
    pinned: BTreeMap<ItemId, NodeId>,
}

impl<'r> CapacityLedger<'r> {
    /// Seed from the topology. Items already stored count as placed.
    pub fn from_topology(topology: &Topology, items: &'r ItemRegistry) -> PlacementResult<Self> {
        let mut ledger = Self {
            items,
            nodes: BTreeMap::new(),
            locations: BTreeMap::new(),
            pinned: BTreeMap::new(),
        };

        for storage in topology.storage_nodes() {
            ledger.nodes.insert(
                storage.id,
                LedgerEntry {
                    capacity: storage.capacity,
                    used: 0,
                    stored: Vec::new(),
                },
            );
            for item in &storage.stored {
                ledger.assign(storage.id, *item)?;
            }
        }
        ledger.pinned = ledger.locations.clone();

        Ok(ledger)
    }

    fn entry(&self, node: NodeId) -> PlacementResult<&LedgerEntry> {
        self.nodes
            .get(&node)
            .ok_or(PlacementError::Topology(TopologyError::NotAStorageNode(node)))
    }

    fn entry_mut(&mut self, node: NodeId) -> PlacementResult<&mut LedgerEntry> {
        self.nodes
            .get_mut(&node)
            .ok_or(PlacementError::Topology(TopologyError::NotAStorageNode(node)))
    }

    pub fn item(&self, id: ItemId) -> PlacementResult<Item> {
        Ok(*self.items.lookup(id)?)
    }

    /// Storage node ids, ascending.
    pub fn storage_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn free(&self, node: NodeId) -> PlacementResult<u64> {
        Ok(self.entry(node)?.free())
    }

    /// Total size on `node`; above its capacity while overcommitted.
    pub fn used(&self, node: NodeId) -> PlacementResult<u128> {
        Ok(self.entry(node)?.used)
    }

    pub fn stored(&self, node: NodeId) -> PlacementResult<&[ItemId]> {
        Ok(&self.entry(node)?.stored)
    }

    pub fn is_overcommitted(&self, node: NodeId) -> bool {
        self.nodes.get(&node).is_some_and(LedgerEntry::is_overcommitted)
    }

    /// Nodes whose free space can take `size`, ascending.
    pub fn nodes_with_room(&self, size: u64) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, entry)| entry.free() >= size)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Where `item` currently lives.
    pub fn location(&self, item: ItemId) -> Option<NodeId> {
        self.locations.get(&item).copied()
    }

    pub fn is_pinned(&self, item: ItemId) -> bool {
        self.pinned.contains_key(&item)
    }

    /// Items whose location differs from the seeded one.
    pub fn placements(&self) -> BTreeMap<ItemId, NodeId> {
        self.locations
            .iter()
            .filter(|(item, node)| self.pinned.get(item) != Some(node))
            .map(|(item, node)| (*item, *node))
            .collect()
    }

    /// Put `item` on `node`. Capacity is not checked: callers that must
    /// not overcommit check [`free`](Self::free) first.
    pub fn assign(&mut self, node: NodeId, item: ItemId) -> PlacementResult<()> {
        if let Some(existing) = self.location(item) {
            return Err(PlacementError::AlreadyAssigned {
                item,
                node: existing,
            });
        }
        let size = self.item(item)?.size;

        let entry = self.entry_mut(node)?;
        entry.stored.push(item);
        entry.used += u128::from(size);
        self.locations.insert(item, node);
        Ok(())
    }

    /// Take `item` off `node`. Returns `false` if it wasn't there.
    pub fn evict(&mut self, node: NodeId, item: ItemId) -> PlacementResult<bool> {
        if self.is_pinned(item) {
            return Err(PlacementError::Pinned { item, node });
        }
        let size = self.item(item)?.size;
        let entry = self.entry_mut(node)?;

        let Some(pos) = entry.stored.iter().position(|i| *i == item) else {
            return Ok(false);
        };
        entry.stored.remove(pos);
        entry.used -= u128::from(size);
        self.locations.remove(&item);
        Ok(true)
    }

    /// Keep the most valuable subset of `node`'s items that fits its
    /// capacity and evict the rest, returned in stored order.
    ///
    /// Pinned items always stay and their size comes off the capacity the
    /// others compete for. `value_of` gives each other item's worth on
    /// this node. Fails with `KnapsackTooLarge` when the exact solution
    /// would need a table over `cell_limit` cells and there are too many
    /// items to search.
    pub fn settle(
        &mut self,
        node: NodeId,
        mut value_of: impl FnMut(ItemId) -> PlacementResult<f64>,
        cell_limit: u64,
    ) -> PlacementResult<Vec<ItemId>> {
        let entry = self.entry(node)?;
        let mut capacity = entry.capacity;

        let mut candidates = Vec::with_capacity(entry.stored.len());
        for item in entry.stored.clone() {
            let size = self.item(item)?.size;
            if self.is_pinned(item) {
                capacity = capacity.saturating_sub(size);
                continue;
            }
            candidates.push(KnapsackEntry {
                key: item,
                weight: size,
                value: value_of(item)?,
            });
        }

        let Some(selection) = knapsack::solve_within(&candidates, capacity, cell_limit) else {
            return Err(PlacementError::KnapsackTooLarge {
                node,
                cells: knapsack::cells(&candidates, capacity),
                limit: cell_limit,
            });
        };
        for item in &selection.rejected {
            self.evict(node, *item)?;
        }

        debug!(
            node,
            kept = selection.chosen.len(),
            evicted = selection.rejected.len(),
            value = selection.total_value,
            used = selection.total_weight,
            capacity,
            "node settled"
        );
        Ok(selection.rejected)
    }

    /// Write every node's contents back to the topology.
    pub fn commit(self, topology: &mut Topology) -> PlacementResult<()> {
        for (node, entry) in self.nodes {
            topology.set_stored(node, entry.stored)?;
        }
        Ok(())
    }
}
