//! nearstore-topology — the weighted network the placement engine runs on.
//!
//! # Components
//!
//! - **`graph`** — [`Topology`]: a simple, undirected, weighted graph of
//!   storage and client nodes with edge-validity rules
//! - **`oracle`** — [`DistanceOracle`]: cached single-source shortest paths
//!   and closest-first traversal

pub mod error;
pub mod graph;
pub mod oracle;

pub use error::{TopologyError, TopologyResult};
pub use graph::{Edge, Topology};
pub use oracle::{ClosestFirst, DistanceOracle, ShortestPaths};
