//! Distance oracle: shortest-path costs over the topology.
//!
//! Each query source gets one Dijkstra run; the result is cached and
//! shared as an `Arc<ShortestPaths>`, so scoring many nodes against the
//! same client costs a single traversal. The cache sits behind an
//! `RwLock`, which keeps the oracle `Send + Sync` for read-only sharing.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::trace;

use nearstore_core::NodeId;

use crate::error::{TopologyError, TopologyResult};
use crate::graph::Topology;

/// Single-source shortest-path distances.
#[derive(Debug, Clone)]
pub struct ShortestPaths {
    distances: HashMap<NodeId, f64>,
    /// Reachable nodes in settle order: non-decreasing distance, ties by id.
    order: Vec<NodeId>,
}

impl ShortestPaths {
    fn compute(topology: &Topology, source: NodeId) -> Self {
        let mut distances: HashMap<NodeId, f64> = HashMap::new();
        let mut order = Vec::new();
        let mut settled = HashSet::new();
        let mut heap = BinaryHeap::new();

        distances.insert(source, 0.0);
        heap.push(Frontier {
            cost: 0.0,
            node: source,
        });

        while let Some(Frontier { cost, node }) = heap.pop() {
            if !settled.insert(node) {
                continue; // Stale entry.
            }
            order.push(node);

            for (next, weight) in topology.neighbors(node) {
                let candidate = cost + weight;
                let improved = distances.get(&next).is_none_or(|best| candidate < *best);
                if improved {
                    distances.insert(next, candidate);
                    heap.push(Frontier {
                        cost: candidate,
                        node: next,
                    });
                }
            }
        }

        Self { distances, order }
    }

    /// Path cost to `to`, or `None` if it can't be reached.
    pub fn distance_to(&self, to: NodeId) -> Option<f64> {
        self.distances.get(&to).copied()
    }

    /// Reachable nodes (the source included), nearest first.
    pub fn closest_first(&self) -> impl Iterator<Item = (NodeId, f64)> + '_ {
        self.order.iter().map(|n| (*n, self.distances[n]))
    }

    pub fn reachable_count(&self) -> usize {
        self.order.len()
    }
}

/// Min-heap entry; ties pop the lowest node id first.
#[derive(Debug, Clone, Copy)]
struct Frontier {
    cost: f64,
    node: NodeId,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Owning closest-first walk rooted at one node.
///
/// Can be advanced incrementally and resumed; it never revisits a node.
#[derive(Debug, Clone)]
pub struct ClosestFirst {
    paths: Arc<ShortestPaths>,
    position: usize,
}

impl Iterator for ClosestFirst {
    type Item = (NodeId, f64);

    fn next(&mut self) -> Option<Self::Item> {
        let node = *self.paths.order.get(self.position)?;
        self.position += 1;
        Some((node, self.paths.distances[&node]))
    }
}

/// Shortest-path queries with a per-source cache.
pub struct DistanceOracle<'a> {
    topology: &'a Topology,
    cache: RwLock<HashMap<NodeId, Arc<ShortestPaths>>>,
}

impl<'a> DistanceOracle<'a> {
    pub fn new(topology: &'a Topology) -> Self {
        Self {
            topology,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn topology(&self) -> &'a Topology {
        self.topology
    }

    /// Distances from `from` to every reachable node.
    pub fn shortest_paths(&self, from: NodeId) -> TopologyResult<Arc<ShortestPaths>> {
        if !self.topology.contains(from) {
            return Err(TopologyError::UnknownNode(from));
        }

        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(paths) = cache.get(&from) {
                return Ok(Arc::clone(paths));
            }
        }

        let paths = Arc::new(ShortestPaths::compute(self.topology, from));
        trace!(source = from, reachable = paths.reachable_count(), "shortest paths computed");

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(cache.entry(from).or_insert(paths)))
    }

    /// Path cost between two nodes.
    pub fn distance(&self, from: NodeId, to: NodeId) -> TopologyResult<f64> {
        if !self.topology.contains(to) {
            return Err(TopologyError::UnknownNode(to));
        }
        self.shortest_paths(from)?
            .distance_to(to)
            .ok_or(TopologyError::Unreachable { from, to })
    }

    /// Walk the topology outwards from `from`, nearest node first.
    pub fn closest_first(&self, from: NodeId) -> TopologyResult<ClosestFirst> {
        Ok(ClosestFirst {
            paths: self.shortest_paths(from)?,
            position: 0,
        })
    }

    /// Number of sources with a cached result.
    pub fn cached_sources(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nearstore_core::Node;

    /// user(3) -2- s0 -1- s1 -1- s2, plus an isolated client 4.
    fn linear() -> Topology {
        let mut t = Topology::new();
        t.add_node(Node::storage(0, 50)).unwrap();
        t.add_node(Node::storage(1, 40)).unwrap();
        t.add_node(Node::storage(2, 40)).unwrap();
        t.add_node(Node::client(3, [0])).unwrap();
        t.add_node(Node::client(4, [0])).unwrap();
        t.add_edge(0, 1, 1.0).unwrap();
        t.add_edge(1, 2, 1.0).unwrap();
        t.add_edge(3, 0, 2.0).unwrap();
        t
    }

    #[test]
    fn distances_along_a_chain() {
        let t = linear();
        let oracle = DistanceOracle::new(&t);

        assert_eq!(oracle.distance(3, 0).unwrap(), 2.0);
        assert_eq!(oracle.distance(3, 1).unwrap(), 3.0);
        assert_eq!(oracle.distance(3, 2).unwrap(), 4.0);
        assert_eq!(oracle.distance(2, 3).unwrap(), 4.0);
        assert_eq!(oracle.distance(1, 1).unwrap(), 0.0);
    }

    #[test]
    fn prefers_cheaper_multi_hop_path() {
        let mut t = Topology::new();
        for id in 0..3 {
            t.add_node(Node::storage(id, 10)).unwrap();
        }
        t.add_edge(0, 2, 10.0).unwrap();
        t.add_edge(0, 1, 2.0).unwrap();
        t.add_edge(1, 2, 3.0).unwrap();

        let oracle = DistanceOracle::new(&t);
        assert_eq!(oracle.distance(0, 2).unwrap(), 5.0);
    }

    #[test]
    fn unreachable_node_is_an_error() {
        let t = linear();
        let oracle = DistanceOracle::new(&t);

        let err = oracle.distance(4, 0).unwrap_err();
        assert!(matches!(err, TopologyError::Unreachable { from: 4, to: 0 }));
        assert!(matches!(
            oracle.distance(9, 0),
            Err(TopologyError::UnknownNode(9))
        ));
    }

    #[test]
    fn single_source_results_are_cached() {
        let t = linear();
        let oracle = DistanceOracle::new(&t);

        oracle.distance(3, 0).unwrap();
        oracle.distance(3, 2).unwrap();
        assert_eq!(oracle.cached_sources(), 1);

        oracle.distance(0, 3).unwrap();
        assert_eq!(oracle.cached_sources(), 2);
    }

    #[test]
    fn closest_first_visits_in_distance_order() {
        let t = linear();
        let oracle = DistanceOracle::new(&t);

        let visited: Vec<(NodeId, f64)> = oracle.closest_first(3).unwrap().collect();
        assert_eq!(visited, vec![(3, 0.0), (0, 2.0), (1, 3.0), (2, 4.0)]);
    }

    #[test]
    fn closest_first_breaks_ties_by_node_id() {
        let mut t = Topology::new();
        t.add_node(Node::client(0, [])).unwrap();
        for id in [3, 1, 2] {
            t.add_node(Node::storage(id, 10)).unwrap();
            t.add_edge(0, id, 1.0).unwrap();
        }

        let oracle = DistanceOracle::new(&t);
        let order: Vec<NodeId> = oracle.closest_first(0).unwrap().map(|(n, _)| n).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn closest_first_resumes_where_it_stopped() {
        let t = linear();
        let oracle = DistanceOracle::new(&t);

        let mut walk = oracle.closest_first(3).unwrap();
        assert_eq!(walk.next().map(|(n, _)| n), Some(3));
        assert_eq!(walk.next().map(|(n, _)| n), Some(0));
        let rest: Vec<NodeId> = walk.map(|(n, _)| n).collect();
        assert_eq!(rest, vec![1, 2]);
    }

    #[test]
    fn oracle_is_shareable_across_threads() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<DistanceOracle<'static>>();

        let t = linear();
        let oracle = DistanceOracle::new(&t);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| assert_eq!(oracle.distance(3, 2).unwrap(), 4.0));
            }
        });
        assert_eq!(oracle.cached_sources(), 1);
    }
}
