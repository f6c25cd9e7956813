//! Placement configuration and the scenario.toml schema.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default upper bound on knapsack DP cells (items × capacity).
pub const DEFAULT_KNAPSACK_CELL_LIMIT: u64 = 1 << 26;

/// How per-client distances fold into one affinity score.
///
/// Every variant is "higher is better".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFormula {
    /// `Σ 1/d²`.
    #[default]
    InverseSquare,
    /// `Σ 1/d`.
    Inverse,
    /// `1 / Σ d²`: ranks nodes exactly like minimizing the sum of squared distances.
    SquaredDistance,
}

/// Which placement algorithm a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Fill one client's interests walking outwards from it.
    NearestFit,
    /// Best-scoring node with room, one pass, no backtracking.
    BestScore,
    /// Optimistic placement with knapsack eviction, repeated until settled.
    Knapsack,
}

impl std::str::FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nearest_fit" | "nearest-fit" => Ok(Self::NearestFit),
            "best_score" | "best-score" => Ok(Self::BestScore),
            "knapsack" => Ok(Self::Knapsack),
            other => Err(format!(
                "unknown strategy '{other}' (expected nearest_fit, best_score or knapsack)"
            )),
        }
    }
}

impl std::str::FromStr for ScoreFormula {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inverse_square" | "inverse-square" => Ok(Self::InverseSquare),
            "inverse" => Ok(Self::Inverse),
            "squared_distance" | "squared-distance" => Ok(Self::SquaredDistance),
            other => Err(format!(
                "unknown formula '{other}' (expected inverse_square, inverse or squared_distance)"
            )),
        }
    }
}

/// Tuning knobs for the placement engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementConfig {
    #[serde(default)]
    pub formula: ScoreFormula,
    /// Refuse knapsack instances whose DP table would exceed this many cells.
    #[serde(default = "default_cell_limit")]
    pub knapsack_cell_limit: u64,
}

fn default_cell_limit() -> u64 {
    DEFAULT_KNAPSACK_CELL_LIMIT
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            formula: ScoreFormula::default(),
            knapsack_cell_limit: DEFAULT_KNAPSACK_CELL_LIMIT,
        }
    }
}

// ── Scenario files ────────────────────────────────────────────────

/// A complete placement scenario: items, nodes, edges, and the run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub placement: PlacementSection,
    #[serde(default)]
    pub items: Vec<ItemEntry>,
    #[serde(default)]
    pub storage: Vec<StorageEntry>,
    #[serde(default)]
    pub clients: Vec<ClientEntry>,
    #[serde(default)]
    pub edges: Vec<EdgeEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementSection {
    pub strategy: StrategyKind,
    /// Designated client for `nearest_fit`.
    pub client: Option<String>,
    pub formula: Option<ScoreFormula>,
    pub knapsack_cell_limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemEntry {
    pub name: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageEntry {
    pub name: String,
    pub capacity: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientEntry {
    pub name: String,
    /// Item names.
    #[serde(default)]
    pub interests: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeEntry {
    pub a: String,
    pub b: String,
    pub weight: f64,
}

impl ScenarioConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: ScenarioConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Placement knobs with scenario overrides applied to the defaults.
    pub fn placement_config(&self) -> PlacementConfig {
        let defaults = PlacementConfig::default();
        PlacementConfig {
            formula: self.placement.formula.unwrap_or(defaults.formula),
            knapsack_cell_limit: self
                .placement
                .knapsack_cell_limit
                .unwrap_or(defaults.knapsack_cell_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINEAR: &str = r#"
[placement]
strategy = "knapsack"

[[items]]
name = "a"
size = 40

[[storage]]
name = "node0"
capacity = 50

[[clients]]
name = "user0"
interests = ["a"]

[[edges]]
a = "user0"
b = "node0"
weight = 2.0
"#;

    #[test]
    fn parses_scenario() {
        let config = ScenarioConfig::from_toml_str(LINEAR).unwrap();
        assert_eq!(config.placement.strategy, StrategyKind::Knapsack);
        assert_eq!(config.items.len(), 1);
        assert_eq!(config.storage[0].capacity, 50);
        assert_eq!(config.clients[0].interests, vec!["a".to_string()]);
        assert_eq!(config.edges[0].weight, 2.0);
    }

    #[test]
    fn placement_defaults_apply_when_unset() {
        let config = ScenarioConfig::from_toml_str(LINEAR).unwrap();
        assert_eq!(config.placement_config(), PlacementConfig::default());
    }

    #[test]
    fn placement_overrides_apply() {
        let toml_str = r#"
[placement]
strategy = "best_score"
formula = "squared_distance"
knapsack_cell_limit = 1000
"#;
        let config = ScenarioConfig::from_toml_str(toml_str).unwrap();
        let placement = config.placement_config();
        assert_eq!(placement.formula, ScoreFormula::SquaredDistance);
        assert_eq!(placement.knapsack_cell_limit, 1000);
        assert!(config.items.is_empty());
    }

    #[test]
    fn rejects_unknown_strategy() {
        let toml_str = r#"
[placement]
strategy = "random"
"#;
        assert!(ScenarioConfig::from_toml_str(toml_str).is_err());
    }

    #[test]
    fn strategy_and_formula_parse_from_flags() {
        assert_eq!("nearest-fit".parse::<StrategyKind>(), Ok(StrategyKind::NearestFit));
        assert_eq!("knapsack".parse::<StrategyKind>(), Ok(StrategyKind::Knapsack));
        assert!("greedy".parse::<StrategyKind>().is_err());
        assert_eq!("inverse".parse::<ScoreFormula>(), Ok(ScoreFormula::Inverse));
    }

    #[test]
    fn round_trips_through_toml() {
        let config = ScenarioConfig::from_toml_str(LINEAR).unwrap();
        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("node0"));
        assert!(rendered.contains("knapsack"));
    }
}
