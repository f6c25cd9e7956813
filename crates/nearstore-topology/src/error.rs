//! Error types for topology construction and distance queries.

use thiserror::Error;

use nearstore_core::NodeId;

/// Result type alias for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;

/// Errors raised while building or querying a [`Topology`](crate::Topology).
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("node already exists: {0}")]
    DuplicateNode(NodeId),

    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("invalid edge {a} -- {b}: {reason}")]
    InvalidEdge {
        a: NodeId,
        b: NodeId,
        reason: &'static str,
    },

    #[error("edge already exists: {a} -- {b}")]
    DuplicateEdge { a: NodeId, b: NodeId },

    #[error("invalid weight {weight} on edge {a} -- {b}: must be positive and finite")]
    InvalidWeight { a: NodeId, b: NodeId, weight: f64 },

    #[error("node {to} is unreachable from node {from}")]
    Unreachable { from: NodeId, to: NodeId },

    #[error("node {0} is not a storage node")]
    NotAStorageNode(NodeId),

    #[error("node {0} is not a client node")]
    NotAClient(NodeId),
}
