use std::fmt;

use super::registry::PortDirection;

/// Errors raised by the graph model, the registry and the tree synchronizer.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    /// No node type with this id in the registry.
    UnknownType(String),
    UnknownSetting {
        type_id: String,
        setting: String,
    },
    UnknownPort {
        type_id: String,
        port: String,
        direction: PortDirection,
    },
    /// A value or connection whose type does not agree with its target.
    TypeMismatch { expected: String, found: String },
    /// An input link names a node id that is not part of the graph.
    DanglingReference { node_id: String, input: String, upstream: String },
    DuplicateConnection,
    /// A catalog entry that cannot be turned into a node type.
    InvalidDescriptor {
        type_id: String,
        key: String,
        reason: String,
    },
    DuplicateNode(String),
    UnknownNode(String),
}

impl GraphError {
    pub fn type_mismatch(expected: impl fmt::Display, found: impl fmt::Display) -> Self {
        GraphError::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Gesture-level errors are recovered by aborting the drag; everything else aborts the operation.
    pub fn is_recoverable_gesture(&self) -> bool {
        matches!(
            self,
            GraphError::TypeMismatch { .. } | GraphError::DuplicateConnection
        )
    }
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphError::UnknownType(type_id) => write!(f, "Unknown node type '{}'", type_id),
            GraphError::UnknownSetting { type_id, setting } => {
                write!(f, "Node type '{}' has no setting '{}'", type_id, setting)
            }
            GraphError::UnknownPort {
                type_id,
                port,
                direction,
            } => write!(f, "Node type '{}' has no {} port '{}'", type_id, direction, port),
            GraphError::TypeMismatch { expected, found } => {
                write!(f, "Type mismatch: expected {}, found {}", expected, found)
            }
            GraphError::DanglingReference {
                node_id,
                input,
                upstream,
            } => write!(
                f,
                "Input '{}' of node {} references missing node {}",
                input, node_id, upstream
            ),
            GraphError::DuplicateConnection => write!(f, "Connection already exists"),
            GraphError::InvalidDescriptor {
                type_id,
                key,
                reason,
            } => write!(f, "Invalid descriptor {}.{}: {}", type_id, key, reason),
            GraphError::DuplicateNode(id) => write!(f, "Node id {} appears more than once", id),
            GraphError::UnknownNode(id) => write!(f, "No node with id {}", id),
        }
    }
}

impl std::error::Error for GraphError {}
