use std::fmt;
use std::sync::Arc;

use super::connections::{Connection, PortRef};
use super::error::GraphError;
use super::node::{NodeId, NodeInstance};
use super::registry::{PortDirection, Registry};
use super::widgets::{EditOutcome, SettingAddress, SettingValue, WidgetInput};
use crate::models::Position;

/// What a node removal took with it.
#[derive(Clone, Debug, PartialEq)]
pub struct RemovedNode {
    pub node: NodeInstance,
    /// Every edge that had the node as source or target.
    pub connections: Vec<Connection>,
}

/// The live graph. Nodes are kept in creation order; each node owns its
/// incoming connections, so the edge list is derived, never stored twice.
#[derive(Clone)]
pub struct GraphState {
    registry: Arc<Registry>,
    nodes: Vec<NodeInstance>,
}

impl GraphState {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            nodes: Vec::new(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Instantiates `type_id` under a freshly generated id.
    pub fn add_node(&mut self, type_id: &str, position: Position) -> Result<NodeId, GraphError> {
        self.insert_node(type_id, NodeId::generate(), position)
    }

    pub fn insert_node(
        &mut self,
        type_id: &str,
        id: NodeId,
        position: Position,
    ) -> Result<NodeId, GraphError> {
        let node_type = self.registry.get(type_id)?;
        let node = NodeInstance::instantiate(node_type, id.clone(), position);
        self.push_node(node)?;
        Ok(id)
    }

    pub(crate) fn push_node(&mut self, node: NodeInstance) -> Result<(), GraphError> {
        if self.contains(node.id()) {
            return Err(GraphError::DuplicateNode(node.id().to_string()));
        }
        self.nodes.push(node);
        Ok(())
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.iter().any(|node| node.id() == id)
    }

    pub fn node(&self, id: &NodeId) -> Result<&NodeInstance, GraphError> {
        self.nodes
            .iter()
            .find(|node| node.id() == id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))
    }

    pub fn node_mut(&mut self, id: &NodeId) -> Result<&mut NodeInstance, GraphError> {
        self.nodes
            .iter_mut()
            .find(|node| node.id() == id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))
    }

    /// Nodes in creation order.
    pub fn nodes(&self) -> &[NodeInstance] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn move_node(&mut self, id: &NodeId, position: Position) -> Result<(), GraphError> {
        self.node_mut(id)?.position = position;
        Ok(())
    }

    /// Removes the node and every edge touching it. Removing an absent id
    /// is a no-op and returns `None`.
    pub fn remove_node(&mut self, id: &NodeId) -> Option<RemovedNode> {
        let index = self.nodes.iter().position(|node| node.id() == id)?;
        let mut node = self.nodes.remove(index);

        let mut connections = node.take_incoming();
        for other in &mut self.nodes {
            connections.extend(other.detach_from(id));
        }

        Some(RemovedNode { node, connections })
    }

    /// All committed edges, grouped by target node in creation order.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.nodes.iter().flat_map(|node| node.incoming_connections())
    }

    /// Records `source -> target` after checking both ports exist and carry
    /// the same data type. Returns the edge evicted from `target`, if any.
    pub fn connect(
        &mut self,
        source: PortRef,
        target: PortRef,
    ) -> Result<Option<Connection>, GraphError> {
        let source_type = self
            .node(&source.node_id)?
            .port(&source.port_key, PortDirection::Output)?
            .data_type
            .clone();
        let target_node = self.node(&target.node_id)?;
        let target_type = &target_node.port(&target.port_key, PortDirection::Input)?.data_type;
        if *target_type != source_type {
            return Err(GraphError::type_mismatch(target_type, &source_type));
        }

        let connection = Connection::new(source, target);
        if target_node.incoming(&connection.target.port_key) == Some(&connection) {
            return Err(GraphError::DuplicateConnection);
        }

        let evicted = self.node_mut(&connection.target.node_id)?.attach(connection);
        Ok(evicted)
    }

    /// Frees an input port. Idempotent.
    pub fn disconnect_input(&mut self, input: &PortRef) -> Option<Connection> {
        self.node_mut(&input.node_id).ok()?.detach(&input.port_key)
    }

    /// Removes exactly this edge. Returns `false` if it was not present.
    pub fn remove_connection(&mut self, connection: &Connection) -> bool {
        let Ok(node) = self.node_mut(&connection.target.node_id) else {
            return false;
        };
        if node.incoming(&connection.target.port_key) != Some(connection) {
            return false;
        }
        node.detach(&connection.target.port_key).is_some()
    }

    pub fn edit_setting(
        &mut self,
        address: &SettingAddress,
        input: WidgetInput,
    ) -> Result<EditOutcome, GraphError> {
        self.node_mut(&address.node_id)?
            .setting_mut(&address.setting)?
            .apply(input)
    }

    pub fn set_setting(&mut self, address: &SettingAddress, value: SettingValue) -> Result<(), GraphError> {
        self.node_mut(&address.node_id)?
            .setting_mut(&address.setting)?
            .set_value(value)
    }

    pub fn setting_value(&self, address: &SettingAddress) -> Result<&SettingValue, GraphError> {
        Ok(self
            .node(&address.node_id)?
            .setting(&address.setting)?
            .current_value())
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

/// Two graphs are equal when their nodes are, in order. The registry is
/// context, not content.
impl PartialEq for GraphState {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl fmt::Debug for GraphState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphState")
            .field("node_types", &self.registry.len())
            .field("nodes", &self.nodes)
            .finish()
    }
}
