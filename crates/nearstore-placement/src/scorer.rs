//! Affinity scoring for placement decisions.
//!
//! A storage node's fit for an item is computed from the path costs
//! between the node and every client interested in that item:
//! - **Inverse-square** (default): `Σ 1/d²`, favours one very close client
//!   over many mediocre ones
//! - **Inverse**: `Σ 1/d`
//! - **Squared distance**: `1 / Σ d²`, the same ranking as minimizing `Σ d²`
//!
//! Higher is always better. A zero distance scores `f64::MAX`.
//! A node that some interested client cannot reach is not a candidate.

use tracing::trace;

use nearstore_core::{NodeId, ScoreFormula};
use nearstore_topology::{DistanceOracle, TopologyError};

use crate::error::PlacementResult;

/// Fold per-client distances into one score.
pub fn affinity(formula: ScoreFormula, distances: impl IntoIterator<Item = f64>) -> f64 {
    let mut total = 0.0;
    let mut seen_any = false;

    for d in distances {
        seen_any = true;
        if d == 0.0 {
            return f64::MAX;
        }
        total += match formula {
            ScoreFormula::InverseSquare => 1.0 / (d * d),
            ScoreFormula::Inverse => 1.0 / d,
            ScoreFormula::SquaredDistance => d * d,
        };
    }

    let score = match formula {
        ScoreFormula::SquaredDistance if seen_any => 1.0 / total,
        ScoreFormula::SquaredDistance => 0.0,
        _ => total,
    };
    score.min(f64::MAX)
}

/// Scored candidate node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeScore {
    pub node_id: NodeId,
    pub score: f64,
}

/// Scores storage nodes against interested clients using a shared oracle.
pub struct AffinityScorer<'a> {
    oracle: &'a DistanceOracle<'a>,
    formula: ScoreFormula,
}

impl<'a> AffinityScorer<'a> {
    pub fn new(oracle: &'a DistanceOracle<'a>, formula: ScoreFormula) -> Self {
        Self { oracle, formula }
    }

    /// Score `node` for an item wanted by `clients`.
    ///
    /// Returns `None` if any of the clients cannot reach the node.
    pub fn score_node(&self, node: NodeId, clients: &[NodeId]) -> PlacementResult<Option<NodeScore>> {
        let mut distances = Vec::with_capacity(clients.len());
        for client in clients {
            match self.oracle.distance(*client, node) {
                Ok(d) => distances.push(d),
                Err(TopologyError::Unreachable { .. }) => {
                    trace!(node, client, "node unreachable from client, not a candidate");
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Some(NodeScore {
            node_id: node,
            score: affinity(self.formula, distances),
        }))
    }

    /// Score all candidates and return them best first; ties go to the lowest id.
    pub fn rank_nodes(
        &self,
        candidates: impl IntoIterator<Item = NodeId>,
        clients: &[NodeId],
    ) -> PlacementResult<Vec<NodeScore>> {
        let mut scores = Vec::new();
        for node in candidates {
            if let Some(score) = self.score_node(node, clients)? {
                scores.push(score);
            }
        }

        scores.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        Ok(scores)
    }

    /// Highest-scoring candidate, if any is reachable.
    pub fn best_node(
        &self,
        candidates: impl IntoIterator<Item = NodeId>,
        clients: &[NodeId],
    ) -> PlacementResult<Option<NodeScore>> {
        Ok(self.rank_nodes(candidates, clients)?.into_iter().next())
    }
}
