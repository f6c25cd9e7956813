//! Placement engine: decides which storage node holds each item.
//!
//! Three interchangeable strategies share one contract: every item that
//! some client wants ends up on exactly one storage node, or the call
//! fails with `InsufficientCapacity` and the topology is left untouched.
//!
//! 1. **Nearest fit**: one client's interests, walking outwards from it
//! 2. **Best score**: each item on the best-scoring node with room, once
//! 3. **Knapsack**: optimistic best-score placement, then knapsack
//!    eviction on overcommitted nodes, repeated until nothing is pending

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info, warn};

use nearstore_core::{ItemId, ItemRegistry, NodeId, PlacementConfig, StrategyKind};
use nearstore_topology::{DistanceOracle, Topology};

use crate::demand::Demand;
use crate::error::{PlacementError, PlacementResult};
use crate::ledger::CapacityLedger;
use crate::scorer::AffinityScorer;

/// A placement algorithm and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Place the interests of `client` on the nearest nodes with room.
    NearestFit { client: NodeId },
    BestScore,
    Knapsack,
}

impl Strategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::NearestFit { .. } => StrategyKind::NearestFit,
            Strategy::BestScore => StrategyKind::BestScore,
            Strategy::Knapsack => StrategyKind::Knapsack,
        }
    }
}

/// Outcome of a successful placement run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacementReport {
    pub strategy: StrategyKind,
    /// Item → node for every item placed by this run.
    pub assignments: BTreeMap<ItemId, NodeId>,
    /// Placement rounds (always 1 except for the knapsack strategy).
    pub rounds: u32,
    /// Items evicted by knapsack rebalancing along the way.
    pub evictions: usize,
}

/// Run `strategy` over `topology` and store the result in its storage nodes.
pub fn place(
    topology: &mut Topology,
    items: &ItemRegistry,
    strategy: Strategy,
    config: &PlacementConfig,
) -> PlacementResult<PlacementReport> {
    let mut ledger = CapacityLedger::from_topology(topology, items)?;

    let report = {
        let oracle = DistanceOracle::new(topology);
        let demand = Demand::from_topology(topology, items)?;
        match strategy {
            Strategy::NearestFit { client } => nearest_fit(client, &oracle, &mut ledger),
            Strategy::BestScore => best_score(&oracle, &demand, &mut ledger, config),
            Strategy::Knapsack => knapsack_rebalance(&oracle, &demand, &mut ledger, config),
        }?
    };

    ledger.commit(topology)?;
    info!(
        strategy = ?report.strategy,
        placed = report.assignments.len(),
        rounds = report.rounds,
        evictions = report.evictions,
        "placement complete"
    );
    Ok(report)
}

fn insufficient(ledger: &CapacityLedger, item: ItemId, reason: impl Into<String>) -> PlacementError {
    let size = ledger.item(item).map(|i| i.size).unwrap_or_default();
    let reason = reason.into();
    warn!(item, size, %reason, "could not place item");
    PlacementError::InsufficientCapacity { item, size, reason }
}

/// Strategy A: place one client's interests, in declaration order, on the
/// closest storage nodes.
///
/// The closest-first walk is never rewound: once the walk has moved past
/// a node, a later (smaller) item will not go back to it even if it still
/// has room. Only the node the walk currently stands on is reused.
pub fn nearest_fit(
    client: NodeId,
    oracle: &DistanceOracle,
    ledger: &mut CapacityLedger,
) -> PlacementResult<PlacementReport> {
    let topology = oracle.topology();
    let interests = topology.client(client)?.interests.clone();
    let mut walk = oracle
        .closest_first(client)?
        .map(|(node, _)| node)
        .filter(|node| topology.node(*node).is_some_and(|n| n.is_storage()));

    let mut current: Option<NodeId> = None;
    let mut assignments = BTreeMap::new();

    for item_id in interests {
        if ledger.location(item_id).is_some() {
            continue;
        }
        let item = ledger.item(item_id)?;

        loop {
            if let Some(node) = current {
                if ledger.free(node)? >= item.size {
                    break;
                }
            }
            match walk.next() {
                Some(node) => current = Some(node),
                None => {
                    return Err(insufficient(
                        ledger,
                        item_id,
                        format!("no storage node reachable from client {client} has enough free space left"),
                    ));
                }
            }
        }

        if let Some(node) = current {
            ledger.assign(node, item_id)?;
            assignments.insert(item_id, node);
            debug!(item = item_id, node, size = item.size, "placed item on nearest node");
        }
    }

    Ok(PlacementReport {
        strategy: StrategyKind::NearestFit,
        assignments,
        rounds: 1,
        evictions: 0,
    })
}

/// Strategy B: put each wanted item on the highest-scoring node that
/// still has room. Earlier choices are never revisited, so this can fail
/// where a different arrangement would have fit.
pub fn best_score(
    oracle: &DistanceOracle,
    demand: &Demand,
    ledger: &mut CapacityLedger,
    config: &PlacementConfig,
) -> PlacementResult<PlacementReport> {
    let scorer = AffinityScorer::new(oracle, config.formula);
    let mut assignments = BTreeMap::new();

    for item_id in demand.items() {
        if ledger.location(item_id).is_some() {
            continue;
        }
        let item = ledger.item(item_id)?;
        let clients = demand.interested_clients(item_id);

        let candidates = ledger.nodes_with_room(item.size);
        let had_candidates = !candidates.is_empty();

        let Some(best) = scorer.best_node(candidates, clients)? else {
            let reason = if had_candidates {
                "no storage node with enough free space is reachable from every interested client"
            } else {
                "no storage node has enough free space"
            };
            return Err(insufficient(ledger, item_id, reason));
        };

        ledger.assign(best.node_id, item_id)?;
        assignments.insert(item_id, best.node_id);
        debug!(item = item_id, node = best.node_id, score = best.score, "placed item");
    }

    Ok(PlacementReport {
        strategy: StrategyKind::BestScore,
        assignments,
        rounds: 1,
        evictions: 0,
    })
}

/// Strategy C: optimistic placement with knapsack rebalancing.
///
/// Each round puts every pending item on its best available node
/// regardless of capacity, then settles every overcommitted node by
/// keeping the most valuable subset that fits. Evicted items are pending
/// in the next round; settled nodes take no further items. Every round
/// either empties the pending set or settles at least one node, so the
/// loop terminates. Items stored before the run never move.
pub fn knapsack_rebalance(
    oracle: &DistanceOracle,
    demand: &Demand,
    ledger: &mut CapacityLedger,
    config: &PlacementConfig,
) -> PlacementResult<PlacementReport> {
    let scorer = AffinityScorer::new(oracle, config.formula);

    let mut available: BTreeSet<NodeId> = ledger.storage_ids().collect();
    let mut pending: Vec<ItemId> = demand
        .items()
        .filter(|item| ledger.location(*item).is_none())
        .collect();
    let mut rounds = 0;
    let mut evictions = 0;

    while let Some(&first) = pending.first() {
        if available.is_empty() {
            return Err(insufficient(
                ledger,
                first,
                format!("{} item(s) still pending after every storage node settled", pending.len()),
            ));
        }
        rounds += 1;

        for &item_id in &pending {
            let clients = demand.interested_clients(item_id);
            let Some(best) = scorer.best_node(available.iter().copied(), clients)? else {
                return Err(insufficient(
                    ledger,
                    item_id,
                    "no available storage node is reachable from every interested client",
                ));
            };
            ledger.assign(best.node_id, item_id)?;
            debug!(round = rounds, item = item_id, node = best.node_id, score = best.score, "optimistic placement");
        }

        let overcommitted: Vec<NodeId> = available
            .iter()
            .copied()
            .filter(|node| ledger.is_overcommitted(*node))
            .collect();

        let mut evicted = Vec::new();
        for node in overcommitted {
            let dropped = ledger.settle(
                node,
                |item| {
                    let clients = demand.interested_clients(item);
                    Ok(scorer.score_node(node, clients)?.map_or(0.0, |s| s.score))
                },
                config.knapsack_cell_limit,
            )?;
            available.remove(&node);
            evicted.extend(dropped);
        }

        evicted.sort_unstable();
        evictions += evicted.len();
        info!(
            round = rounds,
            placed = pending.len(),
            evicted = evicted.len(),
            available = available.len(),
            "rebalancing round finished"
        );
        pending = evicted;
    }

    Ok(PlacementReport {
        strategy: StrategyKind::Knapsack,
        assignments: ledger.placements(),
        rounds,
        evictions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nearstore_core::{IdAllocator, Node, ScoreFormula};

    fn make_items(sizes: &[u64]) -> ItemRegistry {
        let mut ids = IdAllocator::new();
        let mut items = ItemRegistry::new();
        for size in sizes {
            items.create(&mut ids, *size);
        }
        items
    }

    /// user(3) -2- s0(50) -1- s1(40) -1- s2(40), user wants items 0, 1, 2.
    fn linear(interests: &[ItemId]) -> Topology {
        let mut t = Topology::new();
        t.add_node(Node::storage(0, 50)).unwrap();
        t.add_node(Node::storage(1, 40)).unwrap();
        t.add_node(Node::storage(2, 40)).unwrap();
        t.add_node(Node::client(3, interests.iter().copied())).unwrap();
        t.add_edge(0, 1, 1.0).unwrap();
        t.add_edge(1, 2, 1.0).unwrap();
        t.add_edge(3, 0, 2.0).unwrap();
        t
    }

    fn stored(t: &Topology, node: NodeId) -> Vec<ItemId> {
        t.storage(node).unwrap().stored.clone()
    }

    #[test]
    fn nearest_fit_fills_closest_nodes_first() {
        let items = make_items(&[40, 25, 25]);
        let mut t = linear(&[0, 1, 2]);

        let report = place(&mut t, &items, Strategy::NearestFit { client: 3 }, &PlacementConfig::default()).unwrap();

        assert_eq!(stored(&t, 0), vec![0]);
        assert_eq!(stored(&t, 1), vec![1]);
        assert_eq!(stored(&t, 2), vec![2]);
        assert_eq!(report.assignments.len(), 3);
    }

    #[test]
    fn nearest_fit_reuses_current_node_while_it_has_room() {
        let items = make_items(&[20, 20, 20]);
        let mut t = linear(&[0, 1, 2]);

        place(&mut t, &items, Strategy::NearestFit { client: 3 }, &PlacementConfig::default()).unwrap();

        assert_eq!(stored(&t, 0), vec![0, 1]);
        assert_eq!(stored(&t, 1), vec![2]);
    }

    #[test]
    fn nearest_fit_never_walks_back() {
        // s0 keeps 10 free after item 0, but the walk has moved on to s1 for
        // item 1; item 2 (size 5) doesn't fit the 2 left on s1 and goes to s2.
        let items = make_items(&[40, 38, 5]);
        let mut t = linear(&[0, 1, 2]);

        place(&mut t, &items, Strategy::NearestFit { client: 3 }, &PlacementConfig::default()).unwrap();

        assert_eq!(stored(&t, 0), vec![0]);
        assert_eq!(stored(&t, 1), vec![1]);
        assert_eq!(stored(&t, 2), vec![2]);
    }

    #[test]
    fn nearest_fit_fails_when_walk_is_exhausted() {
        // Every node is full by the time the last item arrives.
        let items = make_items(&[45, 40, 40, 40]);
        let mut t = linear(&[0, 1, 2, 3]);

        let err = place(&mut t, &items, Strategy::NearestFit { client: 3 }, &PlacementConfig::default())
            .unwrap_err();
        assert!(matches!(err, PlacementError::InsufficientCapacity { item: 3, size: 40, .. }));
        // All or nothing.
        assert!(t.storage_nodes().all(|s| s.stored.is_empty()));
    }

    #[test]
    fn nearest_fit_requires_a_client() {
        let items = make_items(&[1]);
        let mut t = linear(&[0]);
        let err = place(&mut t, &items, Strategy::NearestFit { client: 0 }, &PlacementConfig::default())
            .unwrap_err();
        assert!(matches!(err, PlacementError::Topology(_)));
    }

    #[test]
    fn best_score_prefers_closest_node_with_room() {
        let items = make_items(&[40, 25, 25]);
        let mut t = linear(&[0, 1, 2]);

        let report = place(&mut t, &items, Strategy::BestScore, &PlacementConfig::default()).unwrap();

        // Item 0 takes s0; s0 has 10 left so both 25s move outward.
        assert_eq!(stored(&t, 0), vec![0]);
        assert_eq!(stored(&t, 1), vec![1]);
        assert_eq!(stored(&t, 2), vec![2]);
        assert_eq!(report.rounds, 1);
    }

    #[test]
    fn best_score_can_fail_where_knapsack_succeeds() {
        // s0 fits 30, s1 fits 20. Item 0 (20) greedily takes s0 and item 1
        // (30) then has nowhere to go. Knapsack keeps item 1 on s0 because
        // its client sits right next to it, and moves item 0 to s1.
        let items = make_items(&[20, 30]);
        let mut t = Topology::new();
        t.add_node(Node::storage(0, 30)).unwrap();
        t.add_node(Node::storage(1, 20)).unwrap();
        t.add_node(Node::client(2, [0])).unwrap();
        t.add_node(Node::client(3, [1])).unwrap();
        t.add_edge(2, 0, 1.0).unwrap();
        t.add_edge(2, 1, 2.0).unwrap();
        t.add_edge(3, 0, 0.5).unwrap();
        t.add_edge(0, 1, 1.0).unwrap();

        let err = place(&mut t.clone(), &items, Strategy::BestScore, &PlacementConfig::default()).unwrap_err();
        assert!(matches!(err, PlacementError::InsufficientCapacity { item: 1, .. }));

        let report = place(&mut t, &items, Strategy::Knapsack, &PlacementConfig::default()).unwrap();
        assert_eq!(stored(&t, 0), vec![1]);
        assert_eq!(stored(&t, 1), vec![0]);
        assert_eq!(report.rounds, 2);
        assert_eq!(report.evictions, 1);
    }

    #[test]
    fn knapsack_places_everything_within_capacity() {
        let items = make_items(&[40, 25, 25]);
        let mut t = linear(&[0, 1, 2]);

        let report = place(&mut t, &items, Strategy::Knapsack, &PlacementConfig::default()).unwrap();

        // All three land on s0 first; with equal per-item scores the two
        // 25s outvalue the 40, which moves on to s1.
        assert_eq!(stored(&t, 0), vec![1, 2]);
        assert_eq!(stored(&t, 1), vec![0]);
        assert!(stored(&t, 2).is_empty());
        assert_eq!(report.assignments.len(), 3);
        assert_eq!(report.rounds, 2);
        assert_eq!(report.evictions, 1);
        for node in t.storage_nodes() {
            assert!(node.used(&items).unwrap() <= node.capacity);
        }
    }

    #[test]
    fn knapsack_fails_when_nodes_run_out() {
        let items = make_items(&[60]);
        let mut t = linear(&[0]);

        let err = place(&mut t, &items, Strategy::Knapsack, &PlacementConfig::default()).unwrap_err();
        assert!(matches!(err, PlacementError::InsufficientCapacity { item: 0, size: 60, .. }));
        assert!(t.storage_nodes().all(|s| s.stored.is_empty()));
    }

    #[test]
    fn knapsack_searches_when_the_table_is_too_large() {
        let items = make_items(&[40, 25, 25]);
        let mut t = linear(&[0, 1, 2]);
        let config = PlacementConfig {
            formula: ScoreFormula::InverseSquare,
            knapsack_cell_limit: 4,
        };

        place(&mut t, &items, Strategy::Knapsack, &config).unwrap();
        assert_eq!(stored(&t, 0), vec![1, 2]);
        assert_eq!(stored(&t, 1), vec![0]);
    }

    #[test]
    fn knapsack_handles_byte_scale_sizes() {
        // With a shared unit the table is tiny; without one the node is
        // settled by search. Either way the layout matches best score.
        for sizes in [
            [600_000_000u64, 600_000_000, 300_000_000],
            [600_000_001, 600_000_000, 300_000_000],
        ] {
            let items = make_items(&sizes);
            let mut t = Topology::new();
            t.add_node(Node::storage(0, 1_000_000_000)).unwrap();
            t.add_node(Node::storage(1, 1_000_000_000)).unwrap();
            t.add_node(Node::client(2, [0, 1, 2])).unwrap();
            t.add_edge(2, 0, 1.0).unwrap();
            t.add_edge(0, 1, 1.0).unwrap();

            let mut greedy = t.clone();
            place(&mut greedy, &items, Strategy::BestScore, &PlacementConfig::default()).unwrap();

            let report = place(&mut t, &items, Strategy::Knapsack, &PlacementConfig::default()).unwrap();
            assert_eq!(stored(&t, 0), vec![0, 2]);
            assert_eq!(stored(&t, 1), vec![1]);
            assert_eq!(stored(&greedy, 0), vec![0, 2]);
            assert_eq!(report.assignments.len(), 3);
        }
    }

    #[test]
    fn knapsack_keeps_items_stored_before_the_run() {
        // Item 0 sits on s0 and nobody wants it; it still holds its space.
        let items = make_items(&[10, 40, 5]);
        let mut t = linear(&[1, 2]);
        t.set_stored(0, vec![0]).unwrap();

        let report = place(&mut t, &items, Strategy::Knapsack, &PlacementConfig::default()).unwrap();

        assert_eq!(stored(&t, 0), vec![0, 1]);
        assert_eq!(stored(&t, 1), vec![2]);
        assert_eq!(report.assignments, BTreeMap::from([(1, 0), (2, 1)]));
        assert_eq!(report.rounds, 2);
        assert_eq!(report.evictions, 1);
    }

    #[test]
    fn already_stored_items_are_left_alone() {
        let items = make_items(&[10, 10]);
        let mut t = linear(&[0, 1]);
        t.set_stored(2, vec![0]).unwrap();

        let report = place(&mut t, &items, Strategy::BestScore, &PlacementConfig::default()).unwrap();

        assert_eq!(report.assignments.len(), 1);
        assert_eq!(report.assignments.get(&1), Some(&0));
        assert_eq!(stored(&t, 2), vec![0]);
    }

    #[test]
    fn report_serializes() {
        let items = make_items(&[10]);
        let mut t = linear(&[0]);
        let report = place(&mut t, &items, Strategy::Knapsack, &PlacementConfig::default()).unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["strategy"], "knapsack");
        assert_eq!(json["assignments"]["0"], 0);
        assert_eq!(json["rounds"], 1);
    }
}
