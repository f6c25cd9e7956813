//! nearstore-core — shared types and configuration for nearstore.
//!
//! Holds the item/node data model, the per-run id allocator and item
//! registry, the placement tuning knobs, and the TOML scenario schema
//! consumed by the CLI.

pub mod config;
pub mod error;
pub mod types;

pub use config::{PlacementConfig, ScenarioConfig, ScoreFormula, StrategyKind};
pub use error::{CoreError, CoreResult};
pub use types::*;
