//! Topology model: storage and client nodes joined by weighted edges.
//!
//! The graph is simple and undirected: at most one edge per unordered
//! pair, no self-loops, and every edge has at least one storage endpoint.
//! Nodes and adjacency live in ordered maps so every iteration is
//! deterministic.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use nearstore_core::{ClientNode, ItemId, Node, NodeId, StorageNode};

use crate::error::{TopologyError, TopologyResult};

/// An undirected edge, reported with `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Edge {
    pub a: NodeId,
    pub b: NodeId,
    /// Transfer cost.
    pub weight: f64,
}

/// The network topology. Owns its nodes and edges for the whole run.
#[derive(Debug, Default, Clone)]
pub struct Topology {
    nodes: BTreeMap<NodeId, Node>,
    adjacency: BTreeMap<NodeId, BTreeMap<NodeId, f64>>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node. Ids must be unique across storage and client nodes.
    pub fn add_node(&mut self, node: Node) -> TopologyResult<()> {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(TopologyError::DuplicateNode(id));
        }
        self.adjacency.insert(id, BTreeMap::new());
        self.nodes.insert(id, node);
        Ok(())
    }

    /// Connect two nodes. `add_edge(a, b, w)` and `add_edge(b, a, w)` are the same edge.
    pub fn add_edge(&mut self, a: NodeId, b: NodeId, weight: f64) -> TopologyResult<()> {
        let node_a = self.nodes.get(&a).ok_or(TopologyError::UnknownNode(a))?;
        let node_b = self.nodes.get(&b).ok_or(TopologyError::UnknownNode(b))?;

        if a == b {
            return Err(TopologyError::InvalidEdge {
                a,
                b,
                reason: "self-loops are not allowed",
            });
        }
        if node_a.is_client() && node_b.is_client() {
            return Err(TopologyError::InvalidEdge {
                a,
                b,
                reason: "two client nodes cannot be connected",
            });
        }
        // Also rejects NaN.
        if !(weight > 0.0) || !weight.is_finite() {
            return Err(TopologyError::InvalidWeight { a, b, weight });
        }
        if self.edge_weight(a, b).is_some() {
            return Err(TopologyError::DuplicateEdge {
                a: a.min(b),
                b: a.max(b),
            });
        }

        self.adjacency.entry(a).or_default().insert(b, weight);
        self.adjacency.entry(b).or_default().insert(a, weight);
        debug!(a, b, weight, "edge added");
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// All nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn storage_nodes(&self) -> impl Iterator<Item = &StorageNode> {
        self.nodes.values().filter_map(Node::as_storage)
    }

    pub fn client_nodes(&self) -> impl Iterator<Item = &ClientNode> {
        self.nodes.values().filter_map(Node::as_client)
    }

    pub fn storage(&self, id: NodeId) -> TopologyResult<&StorageNode> {
        self.nodes
            .get(&id)
            .ok_or(TopologyError::UnknownNode(id))?
            .as_storage()
            .ok_or(TopologyError::NotAStorageNode(id))
    }

    pub fn client(&self, id: NodeId) -> TopologyResult<&ClientNode> {
        self.nodes
            .get(&id)
            .ok_or(TopologyError::UnknownNode(id))?
            .as_client()
            .ok_or(TopologyError::NotAClient(id))
    }

    /// Replace the contents of a storage node.
    pub fn set_stored(&mut self, id: NodeId, stored: Vec<ItemId>) -> TopologyResult<()> {
        let storage = self
            .nodes
            .get_mut(&id)
            .ok_or(TopologyError::UnknownNode(id))?
            .as_storage_mut()
            .ok_or(TopologyError::NotAStorageNode(id))?;
        storage.stored = stored;
        Ok(())
    }

    /// Neighbours of `id` with edge weights, ascending by neighbour id.
    pub fn neighbors(&self, id: NodeId) -> impl Iterator<Item = (NodeId, f64)> + '_ {
        self.adjacency
            .get(&id)
            .into_iter()
            .flat_map(|adj| adj.iter().map(|(n, w)| (*n, *w)))
    }

    pub fn edge_weight(&self, a: NodeId, b: NodeId) -> Option<f64> {
        self.adjacency.get(&a).and_then(|adj| adj.get(&b)).copied()
    }

    /// Every edge exactly once.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.adjacency.iter().flat_map(|(a, adj)| {
            adj.iter()
                .filter(move |(b, _)| *a < **b)
                .map(move |(b, w)| Edge {
                    a: *a,
                    b: *b,
                    weight: *w,
                })
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeMap::len).sum::<usize>() / 2
    }
}
