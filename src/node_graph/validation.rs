use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use std::collections::HashMap;
use std::fmt;

use crate::models::GraphTree;

/// Structural problems in a tree, independent of any catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeValidationError {
    DuplicateNode(String),
    /// An input of `node_id` is fed by a node that is not in the tree.
    DanglingLink {
        node_id: String,
        input: String,
        upstream: String,
    },
    /// The links form a cycle through `node_id`.
    Cycle { node_id: String },
}

impl fmt::Display for TreeValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeValidationError::DuplicateNode(id) => write!(f, "Node id {} appears more than once", id),
            TreeValidationError::DanglingLink {
                node_id,
                input,
                upstream,
            } => write!(
                f,
                "Input '{}' of node {} is linked to missing node {}",
                input, node_id, upstream
            ),
            TreeValidationError::Cycle { node_id } => {
                write!(f, "Graph has a cycle through node {}", node_id)
            }
        }
    }
}

impl std::error::Error for TreeValidationError {}

/// Checks that node ids are unique, every link resolves, and links are acyclic.
pub fn validate_tree(tree: &GraphTree) -> Result<(), TreeValidationError> {
    let mut dependency_graph: DiGraph<&str, ()> = DiGraph::new();
    let mut node_indices = HashMap::new();

    for node in &tree.nodes {
        let idx = dependency_graph.add_node(node.id.as_str());
        if node_indices.insert(node.id.as_str(), idx).is_some() {
            return Err(TreeValidationError::DuplicateNode(node.id.clone()));
        }
    }

    if let Some((node_id, input, link)) = tree.dangling_references().first() {
        return Err(TreeValidationError::DanglingLink {
            node_id: node_id.to_string(),
            input: input.to_string(),
            upstream: link.id.clone(),
        });
    }

    for node in &tree.nodes {
        let to_idx = node_indices[node.id.as_str()];
        for link in node.inputs.values() {
            if let Some(&from_idx) = node_indices.get(link.id.as_str()) {
                dependency_graph.add_edge(from_idx, to_idx, ());
            }
        }
    }

    toposort(&dependency_graph, None)
        .map(|_| ())
        .map_err(|cycle| TreeValidationError::Cycle {
            node_id: dependency_graph[cycle.node_id()].to_string(),
        })
}
