//! Conversion between the live graph and its persisted [`GraphTree`] form.

use std::sync::Arc;

use super::connections::PortRef;
use super::error::GraphError;
use super::node::{NodeId, NodeInstance};
use super::registry::Registry;
use super::state::GraphState;
use crate::models::{GraphTree, InputLink, TreeNode};

/// One tree entry per node, in creation order. Every occupied input is
/// written as a link to its upstream `(node id, output key)`.
pub fn serialize(graph: &GraphState) -> GraphTree {
    GraphTree {
        nodes: graph.nodes().iter().map(serialize_node).collect(),
    }
}

fn serialize_node(node: &NodeInstance) -> TreeNode {
    let settings = node
        .settings()
        .map(|(key, widget)| (key.to_string(), widget.current_value().to_json()))
        .collect();
    let inputs = node
        .incoming_connections()
        .map(|connection| {
            (
                connection.target.port_key.clone(),
                InputLink::new(
                    connection.source.node_id.as_str(),
                    connection.source.port_key.as_str(),
                ),
            )
        })
        .collect();

    TreeNode {
        type_id: node.type_id().to_string(),
        id: node.id().to_string(),
        position: node.position,
        settings,
        inputs,
    }
}

/// Rebuilds a live graph from `tree`, keeping every node id.
///
/// Nodes are created first so that links may point forward in the list.
/// Any failure aborts the whole load; nothing is dropped silently.
pub fn deserialize(tree: &GraphTree, registry: Arc<Registry>) -> Result<GraphState, GraphError> {
    let mut graph = GraphState::new(registry);

    for entry in &tree.nodes {
        let node = instantiate_entry(graph.registry(), entry)?;
        graph.push_node(node)?;
    }

    for entry in &tree.nodes {
        let target_id = NodeId::from(entry.id.as_str());
        for (key, link) in &entry.inputs {
            let upstream = NodeId::from(link.id.as_str());
            if !graph.contains(&upstream) {
                return Err(GraphError::DanglingReference {
                    node_id: entry.id.clone(),
                    input: key.clone(),
                    upstream: link.id.clone(),
                });
            }
            graph.connect(
                PortRef::new(upstream, link.name.as_str()),
                PortRef::new(target_id.clone(), key.as_str()),
            )?;
        }
    }

    log::debug!(
        "[graph_sync] loaded {} nodes, {} connections",
        graph.len(),
        graph.connections().count()
    );
    Ok(graph)
}

fn instantiate_entry(registry: &Registry, entry: &TreeNode) -> Result<NodeInstance, GraphError> {
    let node_type = registry.get(&entry.type_id)?;
    let mut node = NodeInstance::instantiate(node_type, NodeId::from(entry.id.as_str()), entry.position);

    // Settings missing from the entry keep their defaults.
    for (key, raw) in &entry.settings {
        let widget = node.setting_mut(key)?;
        let value = widget.spec().coerce(raw)?;
        widget.set_value(value)?;
    }
    Ok(node)
}
