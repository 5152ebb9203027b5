use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use ts_rs::TS;

/// Canvas position of a node. Travels on the wire as `[x, y]`; older
/// documents may carry `[]` or `null`, both of which read as the origin.
#[derive(Serialize, Clone, Copy, Debug, Default, PartialEq)]
#[serde(into = "(f64, f64)")]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Position {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Vec<f64>>::deserialize(deserializer)?.as_deref() {
            None | Some([]) => Ok(Position::default()),
            Some(&[x, y]) => Ok(Position { x, y }),
            Some(other) => Err(de::Error::invalid_length(other.len(), &"an [x, y] pair or []")),
        }
    }
}

impl From<Position> for (f64, f64) {
    fn from(position: Position) -> Self {
        (position.x, position.y)
    }
}

/// Upstream end of an input: node `id`, output port `name`.
#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[ts(export, export_to = "node_tree.ts")]
pub struct InputLink {
    pub id: String,
    pub name: String,
}

impl InputLink {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(TS, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[ts(export, export_to = "node_tree.ts")]
pub struct TreeNode {
    #[serde(rename = "type")]
    pub type_id: String,
    pub id: String,
    #[serde(default, alias = "pos")]
    #[ts(type = "[number, number]")]
    pub position: Position,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub settings: BTreeMap<String, Value>,
    #[serde(default)]
    pub inputs: BTreeMap<String, InputLink>,
}

impl TreeNode {
    pub fn new(type_id: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            id: id.into(),
            position: Position::default(),
            settings: BTreeMap::new(),
            inputs: BTreeMap::new(),
        }
    }
}

/// The canonical, persisted form of a whole graph.
#[derive(TS, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[ts(export, export_to = "node_tree.ts")]
pub struct GraphTree {
    #[serde(default)]
    pub nodes: Vec<TreeNode>,
}

impl GraphTree {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&TreeNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut TreeNode> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    /// Deletes the entry for `id` and every input, on any node, that was fed by it.
    /// Returns the removed entry; removing an absent id is a no-op.
    pub fn remove_node(&mut self, id: &str) -> Option<TreeNode> {
        let index = self.nodes.iter().position(|node| node.id == id)?;
        let removed = self.nodes.remove(index);

        for node in &mut self.nodes {
            node.inputs.retain(|_, link| link.id != id);
        }

        Some(removed)
    }

    /// `(node id, input key, link)` for every input whose upstream id has no entry.
    pub fn dangling_references(&self) -> Vec<(&str, &str, &InputLink)> {
        self.nodes
            .iter()
            .flat_map(|node| {
                node.inputs
                    .iter()
                    .filter(|(_, link)| self.node(&link.id).is_none())
                    .map(move |(key, link)| (node.id.as_str(), key.as_str(), link))
            })
            .collect()
    }
}
