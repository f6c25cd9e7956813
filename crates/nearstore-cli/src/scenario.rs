//! Build a topology from a scenario.toml.
//!
//! Names in the file are resolved to ids handed out by one
//! [`IdAllocator`], items first, then storage nodes, then clients, each
//! in declaration order.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use anyhow::{Context, bail};

use nearstore_core::{
    IdAllocator, ItemId, ItemRegistry, Node, NodeId, ScenarioConfig, StrategyKind,
};
use nearstore_placement::Strategy;
use nearstore_topology::Topology;

#[derive(Debug)]
pub struct Scenario {
    pub config: ScenarioConfig,
    pub topology: Topology,
    pub items: ItemRegistry,
    pub node_names: BTreeMap<NodeId, String>,
    pub item_names: BTreeMap<ItemId, String>,
    node_ids: HashMap<String, NodeId>,
}

impl Scenario {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config = ScenarioConfig::from_file(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::build(config).with_context(|| format!("invalid scenario {}", path.display()))
    }

    pub fn build(config: ScenarioConfig) -> anyhow::Result<Self> {
        let mut ids = IdAllocator::new();
        let mut items = ItemRegistry::new();
        let mut item_ids: HashMap<String, ItemId> = HashMap::new();
        let mut item_names = BTreeMap::new();

        for entry in &config.items {
            if item_ids.contains_key(&entry.name) {
                bail!("duplicate item name '{}'", entry.name);
            }
            let item = items.create(&mut ids, entry.size);
            item_ids.insert(entry.name.clone(), item.id);
            item_names.insert(item.id, entry.name.clone());
        }

        let mut topology = Topology::new();
        let mut node_ids: HashMap<String, NodeId> = HashMap::new();
        let mut node_names = BTreeMap::new();
        let mut claim = |name: &str, ids: &mut IdAllocator| -> anyhow::Result<NodeId> {
            if node_ids.contains_key(name) {
                bail!("duplicate node name '{name}'");
            }
            let id = ids.next_node_id();
            node_ids.insert(name.to_string(), id);
            node_names.insert(id, name.to_string());
            Ok(id)
        };

        for entry in &config.storage {
            let id = claim(&entry.name, &mut ids)?;
            topology.add_node(Node::storage(id, entry.capacity))?;
        }

        for entry in &config.clients {
            let id = claim(&entry.name, &mut ids)?;
            let interests = entry
                .interests
                .iter()
                .map(|name| {
                    item_ids.get(name).copied().with_context(|| {
                        format!("client '{}' is interested in unknown item '{name}'", entry.name)
                    })
                })
                .collect::<anyhow::Result<Vec<ItemId>>>()?;
            topology.add_node(Node::client(id, interests))?;
        }

        for edge in &config.edges {
            let a = lookup(&node_ids, &edge.a)?;
            let b = lookup(&node_ids, &edge.b)?;
            topology
                .add_edge(a, b, edge.weight)
                .with_context(|| format!("cannot connect '{}' and '{}'", edge.a, edge.b))?;
        }

        Ok(Self {
            config,
            topology,
            items,
            node_names,
            item_names,
            node_ids,
        })
    }

    pub fn node_id(&self, name: &str) -> anyhow::Result<NodeId> {
        lookup(&self.node_ids, name)
    }

    pub fn node_name(&self, id: NodeId) -> &str {
        self.node_names.get(&id).map(String::as_str).unwrap_or("?")
    }

    pub fn item_name(&self, id: ItemId) -> &str {
        self.item_names.get(&id).map(String::as_str).unwrap_or("?")
    }

    /// Resolve a strategy kind into a runnable strategy.
    pub fn strategy(&self, kind: StrategyKind, client: Option<&str>) -> anyhow::Result<Strategy> {
        Ok(match kind {
            StrategyKind::NearestFit => {
                let Some(name) = client else {
                    bail!("nearest_fit needs a client (set [placement].client or pass --client)");
                };
                Strategy::NearestFit {
                    client: self.node_id(name)?,
                }
            }
            StrategyKind::BestScore => Strategy::BestScore,
            StrategyKind::Knapsack => Strategy::Knapsack,
        })
    }
}

fn lookup(node_ids: &HashMap<String, NodeId>, name: &str) -> anyhow::Result<NodeId> {
    node_ids
        .get(name)
        .copied()
        .with_context(|| format!("unknown node '{name}'"))
}
