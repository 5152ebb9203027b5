use std::collections::BTreeMap;
use std::fmt;

use super::connections::{Connection, PortRef};
use super::error::GraphError;
use super::registry::{DataType, NodeType, PortDirection};
use super::widgets::{SettingAddress, SettingValue, SettingWidget};
use crate::models::Position;

/// Globally unique node identity. Generated ids are UUID v4 strings; ids
/// loaded from a tree are kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(String);

impl NodeId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Port {
    pub key: String,
    pub data_type: DataType,
    pub direction: PortDirection,
}

/// A live, positioned instance of a node type.
///
/// Owns its setting widgets (in schema order) and its incoming-connection
/// table. Outgoing connections live in the downstream nodes' tables.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeInstance {
    id: NodeId,
    type_id: String,
    pub position: Position,
    settings: Vec<(String, SettingWidget)>,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
    incoming: BTreeMap<String, Connection>,
}

impl NodeInstance {
    pub fn instantiate(node_type: &NodeType, id: NodeId, position: Position) -> Self {
        let settings = node_type
            .settings
            .iter()
            .map(|(key, spec)| (key.clone(), SettingWidget::new(spec.clone())))
            .collect();
        let ports = |entries: &[(String, DataType)], direction: PortDirection| {
            entries
                .iter()
                .map(|(key, data_type)| Port {
                    key: key.clone(),
                    data_type: data_type.clone(),
                    direction,
                })
                .collect::<Vec<_>>()
        };

        Self {
            id,
            type_id: node_type.type_id.clone(),
            position,
            settings,
            inputs: ports(&node_type.inputs, PortDirection::Input),
            outputs: ports(&node_type.outputs, PortDirection::Output),
            incoming: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    pub fn inputs(&self) -> &[Port] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Port] {
        &self.outputs
    }

    pub fn port(&self, key: &str, direction: PortDirection) -> Result<&Port, GraphError> {
        let ports = match direction {
            PortDirection::Input => &self.inputs,
            PortDirection::Output => &self.outputs,
        };
        ports
            .iter()
            .find(|port| port.key == key)
            .ok_or_else(|| GraphError::UnknownPort {
                type_id: self.type_id.clone(),
                port: key.to_string(),
                direction,
            })
    }

    /// Address of port `key` on this node, for either direction.
    pub fn port_ref(&self, key: &str) -> PortRef {
        PortRef::new(self.id.clone(), key)
    }

    pub fn settings(&self) -> impl Iterator<Item = (&str, &SettingWidget)> {
        self.settings.iter().map(|(key, widget)| (key.as_str(), widget))
    }

    pub fn setting_address(&self, key: &str) -> SettingAddress {
        SettingAddress::new(self.id.clone(), key)
    }

    pub fn setting(&self, key: &str) -> Result<&SettingWidget, GraphError> {
        self.settings
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, widget)| widget)
            .ok_or_else(|| self.unknown_setting(key))
    }

    pub fn setting_mut(&mut self, key: &str) -> Result<&mut SettingWidget, GraphError> {
        match self.settings.iter().position(|(k, _)| k == key) {
            Some(i) => Ok(&mut self.settings[i].1),
            None => Err(self.unknown_setting(key)),
        }
    }

    fn unknown_setting(&self, key: &str) -> GraphError {
        GraphError::UnknownSetting {
            type_id: self.type_id.clone(),
            setting: key.to_string(),
        }
    }

    pub fn setting_values(&self) -> BTreeMap<String, SettingValue> {
        self.settings
            .iter()
            .map(|(key, widget)| (key.clone(), widget.current_value().clone()))
            .collect()
    }

    /// The connection currently feeding input `key`, if any.
    pub fn incoming(&self, key: &str) -> Option<&Connection> {
        self.incoming.get(key)
    }

    /// Occupied inputs in input-schema order.
    pub fn incoming_connections(&self) -> impl Iterator<Item = &Connection> {
        self.inputs.iter().filter_map(|port| self.incoming.get(&port.key))
    }

    /// Occupies input `key`, returning the connection it evicted.
    pub(crate) fn attach(&mut self, connection: Connection) -> Option<Connection> {
        self.incoming.insert(connection.target.port_key.clone(), connection)
    }

    pub(crate) fn detach(&mut self, key: &str) -> Option<Connection> {
        self.incoming.remove(key)
    }

    /// Drops every incoming connection whose source is `upstream`.
    pub(crate) fn detach_from(&mut self, upstream: &NodeId) -> Vec<Connection> {
        let keys: Vec<String> = self
            .incoming
            .iter()
            .filter(|(_, connection)| &connection.source.node_id == upstream)
            .map(|(key, _)| key.clone())
            .collect();
        keys.iter().filter_map(|key| self.incoming.remove(key)).collect()
    }

    pub(crate) fn take_incoming(&mut self) -> Vec<Connection> {
        std::mem::take(&mut self.incoming).into_values().collect()
    }
}
