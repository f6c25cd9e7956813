//! nearstore placement engine — puts items close to the clients that want them.
//!
//! Given a [`Topology`](nearstore_topology::Topology) of storage and client
//! nodes and a registry of items, this crate decides which storage node
//! holds each item so that it sits as close as possible (by path cost) to
//! its interested clients, without exceeding node capacity.
//!
//! # Components
//!
//! - **`scorer`** — Affinity scoring from shortest-path distances
//! - **`ledger`** — Per-node used/free space and item locations
//! - **`knapsack`** — Exact 0/1 knapsack used to settle overcommitted nodes
//! - **`placer`** — The three placement strategies
//! - **`demand`** — Item → interested-clients index

pub mod demand;
pub mod error;
pub mod knapsack;
pub mod ledger;
pub mod placer;
pub mod scorer;

pub use demand::Demand;
pub use error::{PlacementError, PlacementResult};
pub use knapsack::{KnapsackEntry, Selection};
pub use ledger::CapacityLedger;
pub use placer::{PlacementReport, Strategy, best_score, knapsack_rebalance, nearest_fit, place};
pub use scorer::{AffinityScorer, NodeScore, affinity};
