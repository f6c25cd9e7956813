use std::path::Path;

use crate::scenario::Scenario;

pub fn validate(path: &Path) -> anyhow::Result<()> {
    let scenario = Scenario::load(path)?;
    println!("✓ {} is valid", path.display());
    println!("{}", describe(&scenario));
    Ok(())
}

pub fn describe(scenario: &Scenario) -> String {
    let topology = &scenario.topology;
    let capacity: u64 = topology.storage_nodes().map(|n| n.capacity).sum();
    let demand: u64 = scenario.items.iter().map(|i| i.size).sum();
    format!(
        "  {} storage node(s), {} client(s), {} edge(s)\n  {} item(s), total size {demand}, total capacity {capacity}",
        topology.storage_nodes().count(),
        topology.client_nodes().count(),
        topology.edge_count(),
        scenario.items.len(),
    )
}
