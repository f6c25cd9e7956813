//! Which clients want which items.

use std::collections::BTreeMap;

use nearstore_core::{ItemId, ItemRegistry, NodeId};
use nearstore_topology::Topology;

use crate::error::PlacementResult;

/// Item → interested clients, derived once from the topology.
///
/// Items iterate in ascending id order; each client list is ascending too.
#[derive(Debug, Clone, Default)]
pub struct Demand {
    interested: BTreeMap<ItemId, Vec<NodeId>>,
}

impl Demand {
    /// Collect every distinct item referenced by some client.
    ///
    /// Fails with `UnknownItem` if an interest names an unregistered item.
    pub fn from_topology(topology: &Topology, items: &ItemRegistry) -> PlacementResult<Self> {
        let mut interested: BTreeMap<ItemId, Vec<NodeId>> = BTreeMap::new();
        for client in topology.client_nodes() {
            for item in &client.interests {
                items.lookup(*item)?;
                interested.entry(*item).or_default().push(client.id);
            }
        }
        Ok(Self { interested })
    }

    pub fn items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.interested.keys().copied()
    }

    /// Clients interested in `item`; empty if nobody is.
    pub fn interested_clients(&self, item: ItemId) -> &[NodeId] {
        self.interested.get(&item).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.interested.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interested.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nearstore_core::{IdAllocator, Node};

    #[test]
    fn collects_distinct_items_with_their_clients() {
        let mut ids = IdAllocator::new();
        let mut items = ItemRegistry::new();
        for size in [10, 20, 30] {
            items.create(&mut ids, size);
        }

        let mut t = Topology::new();
        t.add_node(Node::storage(0, 100)).unwrap();
        t.add_node(Node::client(5, [2, 0])).unwrap();
        t.add_node(Node::client(3, [0])).unwrap();

        let demand = Demand::from_topology(&t, &items).unwrap();
        assert_eq!(demand.items().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(demand.interested_clients(0), &[3, 5]);
        assert_eq!(demand.interested_clients(2), &[5]);
        assert!(demand.interested_clients(1).is_empty());
        assert_eq!(demand.len(), 2);
    }

    #[test]
    fn unknown_interest_is_rejected() {
        let items = ItemRegistry::new();
        let mut t = Topology::new();
        t.add_node(Node::client(0, [4])).unwrap();

        assert!(Demand::from_topology(&t, &items).is_err());
    }
}
