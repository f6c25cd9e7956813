//! Placement error types.

use thiserror::Error;

use nearstore_core::{CoreError, ItemId, NodeId};
use nearstore_topology::TopologyError;

/// Errors that can occur while placing items.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("insufficient capacity for item {item} (size {size}): {reason}")]
    InsufficientCapacity {
        item: ItemId,
        size: u64,
        reason: String,
    },

    #[error("item {item} is already assigned to node {node}")]
    AlreadyAssigned { item: ItemId, node: NodeId },

    #[error("item {item} was already on node {node} and can't be moved")]
    Pinned { item: ItemId, node: NodeId },

    #[error("knapsack for node {node} needs {cells} cells, limit is {limit}")]
    KnapsackTooLarge { node: NodeId, cells: u64, limit: u64 },

    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("item error: {0}")]
    Item(#[from] CoreError),
}

pub type PlacementResult<T> = Result<T, PlacementError>;
