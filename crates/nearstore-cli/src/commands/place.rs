use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use nearstore_core::{ScoreFormula, StrategyKind};
use nearstore_placement::PlacementReport;

use crate::scenario::Scenario;

pub struct PlaceArgs {
    pub scenario: PathBuf,
    pub strategy: Option<StrategyKind>,
    pub client: Option<String>,
    pub formula: Option<ScoreFormula>,
    pub format: String,
}

/// Placement outcome with ids resolved back to scenario names.
#[derive(Debug, Serialize)]
pub struct PlacementSummary {
    pub strategy: StrategyKind,
    pub formula: ScoreFormula,
    pub rounds: u32,
    pub evictions: usize,
    /// Item name → node name for every item placed by this run.
    pub assignments: BTreeMap<String, String>,
    pub nodes: Vec<NodeSummary>,
}

#[derive(Debug, Serialize)]
pub struct NodeSummary {
    pub name: String,
    pub capacity: u64,
    pub used: u64,
    pub items: Vec<String>,
}

pub fn place(args: &PlaceArgs) -> anyhow::Result<()> {
    let mut scenario = Scenario::load(&args.scenario)?;
    let summary = run(&mut scenario, args)?;

    match args.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => {
            print!("{}", format_summary(&summary));
        }
    }

    Ok(())
}

/// Run the requested strategy; flags win over the scenario's [placement].
pub fn run(scenario: &mut Scenario, args: &PlaceArgs) -> anyhow::Result<PlacementSummary> {
    let section = &scenario.config.placement;
    let kind = args.strategy.unwrap_or(section.strategy);
    let client = args.client.clone().or_else(|| section.client.clone());

    let mut config = scenario.config.placement_config();
    if let Some(formula) = args.formula {
        config.formula = formula;
    }

    let strategy = scenario.strategy(kind, client.as_deref())?;
    info!(
        scenario = %args.scenario.display(),
        strategy = ?kind,
        formula = ?config.formula,
        "running placement"
    );

    let report =
        nearstore_placement::place(&mut scenario.topology, &scenario.items, strategy, &config)?;
    summarize(scenario, &report, config.formula)
}

pub fn summarize(
    scenario: &Scenario,
    report: &PlacementReport,
    formula: ScoreFormula,
) -> anyhow::Result<PlacementSummary> {
    let mut nodes = Vec::new();
    for storage in scenario.topology.storage_nodes() {
        nodes.push(NodeSummary {
            name: scenario.node_name(storage.id).to_string(),
            capacity: storage.capacity,
            used: storage.used(&scenario.items)?,
            items: storage
                .stored
                .iter()
                .map(|item| scenario.item_name(*item).to_string())
                .collect(),
        });
    }

    Ok(PlacementSummary {
        strategy: report.strategy,
        formula,
        rounds: report.rounds,
        evictions: report.evictions,
        assignments: report
            .assignments
            .iter()
            .map(|(item, node)| {
                (scenario.item_name(*item).to_string(), scenario.node_name(*node).to_string())
            })
            .collect(),
        nodes,
    })
}

pub fn format_summary(summary: &PlacementSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "✓ Placed with {:?} ({} round(s), {} eviction(s))",
        summary.strategy, summary.rounds, summary.evictions
    );
    let width = summary.nodes.iter().map(|n| n.name.len()).max().unwrap_or(0);
    for node in &summary.nodes {
        let items = if node.items.is_empty() {
            "-".to_string()
        } else {
            node.items.join(", ")
        };
        let _ = writeln!(
            out,
            "  {:<width$}  {:>6}/{:<6}  {}",
            node.name, node.used, node.capacity, items
        );
    }
    out
}
