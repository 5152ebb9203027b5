//! Port-to-port connections and the drag gesture that creates them.

use std::fmt;

use super::error::GraphError;
use super::node::NodeId;
use super::registry::{DataType, PortDirection};
use super::state::GraphState;

/// Composite address of a port: owning node plus port key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortRef {
    pub node_id: NodeId,
    pub port_key: String,
}

impl PortRef {
    pub fn new(node_id: NodeId, port_key: impl Into<String>) -> Self {
        Self {
            node_id,
            port_key: port_key.into(),
        }
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node_id, self.port_key)
    }
}

/// Directed edge from an output port to an input port.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Connection {
    pub source: PortRef,
    pub target: PortRef,
}

impl Connection {
    pub fn new(source: PortRef, target: PortRef) -> Self {
        Self { source, target }
    }

    pub fn touches(&self, node_id: &NodeId) -> bool {
        &self.source.node_id == node_id || &self.target.node_id == node_id
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Armed {
        source: PortRef,
        data_type: DataType,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum DragOutcome {
    /// The edge was recorded; `evicted` is the edge it displaced, if any.
    Committed {
        connection: Connection,
        evicted: Option<Connection>,
    },
    /// The candidate was rejected and the graph left untouched.
    Aborted(GraphError),
    /// The pointer was released away from any input.
    Cancelled,
    /// No drag was in progress.
    Ignored,
}

impl DragOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, DragOutcome::Committed { .. })
    }
}

/// Gesture state machine: `Idle -> Armed -> (Committed | Aborted) -> Idle`.
///
/// Holds only the in-flight candidate. Committed edges live in the target
/// node's incoming table inside [`GraphState`].
#[derive(Debug, Default)]
pub struct ConnectionManager {
    state: DragState,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, DragState::Armed { .. })
    }

    /// Arms the manager with an output port. A second pointer-down replaces
    /// the earlier candidate; if the new port does not resolve, the manager
    /// is left idle.
    pub fn begin_drag(&mut self, graph: &GraphState, source: PortRef) -> Result<(), GraphError> {
        self.state = DragState::Idle;
        let data_type = graph
            .node(&source.node_id)?
            .port(&source.port_key, PortDirection::Output)?
            .data_type
            .clone();
        self.state = DragState::Armed { source, data_type };
        Ok(())
    }

    /// Ends the gesture over input `target`. Always returns to `Idle`.
    pub fn complete_drag(&mut self, graph: &mut GraphState, target: PortRef) -> DragOutcome {
        let source = match std::mem::take(&mut self.state) {
            DragState::Idle => return DragOutcome::Ignored,
            DragState::Armed { source, .. } => source,
        };

        match graph.connect(source.clone(), target.clone()) {
            Ok(evicted) => {
                if let Some(old) = &evicted {
                    log::debug!("[connections] {} evicted by {}", old, source);
                }
                DragOutcome::Committed {
                    connection: Connection::new(source, target),
                    evicted,
                }
            }
            Err(err) => {
                if !err.is_recoverable_gesture() {
                    log::warn!("[connections] drag {} -> {} aborted: {}", source, target, err);
                }
                DragOutcome::Aborted(err)
            }
        }
    }

    /// Discards the candidate without touching the graph.
    pub fn abort_drag(&mut self) -> DragOutcome {
        match std::mem::take(&mut self.state) {
            DragState::Idle => DragOutcome::Ignored,
            DragState::Armed { .. } => DragOutcome::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Position;
    use crate::node_graph::registry::{NodeType, Registry};
    use std::sync::Arc;

    fn graph() -> GraphState {
        let add = NodeType {
            type_id: "add".into(),
            display_name: "Add".into(),
            settings: vec![],
            inputs: vec![("a".into(), "num".into()), ("b".into(), "num".into())],
            outputs: vec![("sum".into(), "num".into())],
        };
        let label = NodeType {
            type_id: "label".into(),
            display_name: "Label".into(),
            settings: vec![],
            inputs: vec![("text".into(), "str".into())],
            outputs: vec![],
        };
        GraphState::new(Arc::new(Registry::from_types([add, label])))
    }

    #[test]
    fn complete_without_begin_is_ignored() {
        let mut graph = graph();
        let b = graph.add_node("add", Position::default()).unwrap();
        let mut manager = ConnectionManager::new();
        let outcome = manager.complete_drag(&mut graph, PortRef::new(b, "a"));
        assert_eq!(outcome, DragOutcome::Ignored);
        assert_eq!(graph.connections().count(), 0);
    }

    #[test]
    fn begin_drag_requires_an_output_port() {
        let mut graph = graph();
        let a = graph.add_node("add", Position::default()).unwrap();
        let mut manager = ConnectionManager::new();

        let err = manager.begin_drag(&graph, PortRef::new(a.clone(), "a")).unwrap_err();
        assert!(matches!(err, GraphError::UnknownPort { direction: PortDirection::Output, .. }));
        assert!(!manager.is_armed());

        manager.begin_drag(&graph, PortRef::new(a, "sum")).unwrap();
        match manager.state() {
            DragState::Armed { data_type, .. } => assert_eq!(data_type.as_str(), "num"),
            DragState::Idle => panic!("expected armed"),
        }
    }

    #[test]
    fn failed_begin_drops_the_earlier_candidate() {
        let mut graph = graph();
        let a = graph.add_node("add", Position::default()).unwrap();
        let b = graph.add_node("add", Position::default()).unwrap();
        let mut manager = ConnectionManager::new();

        manager.begin_drag(&graph, PortRef::new(a, "sum")).unwrap();
        assert!(manager.begin_drag(&graph, PortRef::new(b.clone(), "nope")).is_err());
        assert!(!manager.is_armed());

        let outcome = manager.complete_drag(&mut graph, PortRef::new(b, "a"));
        assert_eq!(outcome, DragOutcome::Ignored);
        assert_eq!(graph.connections().count(), 0);
    }

    #[test]
    fn committing_returns_to_idle() {
        let mut graph = graph();
        let a = graph.add_node("add", Position::default()).unwrap();
        let b = graph.add_node("add", Position::default()).unwrap();
        let mut manager = ConnectionManager::new();

        manager.begin_drag(&graph, PortRef::new(a.clone(), "sum")).unwrap();
        let outcome = manager.complete_drag(&mut graph, PortRef::new(b.clone(), "b"));
        assert!(outcome.is_committed());
        assert_eq!(manager.state(), &DragState::Idle);

        let incoming = graph.node(&b).unwrap().incoming("b").unwrap();
        assert_eq!(incoming.source, PortRef::new(a, "sum"));
    }

    #[test]
    fn mismatch_and_duplicate_abort_without_mutation() {
        let mut graph = graph();
        let a = graph.add_node("add", Position::default()).unwrap();
        let b = graph.add_node("add", Position::default()).unwrap();
        let l = graph.add_node("label", Position::default()).unwrap();
        let mut manager = ConnectionManager::new();

        manager.begin_drag(&graph, PortRef::new(a.clone(), "sum")).unwrap();
        let before = graph.clone();
        let outcome = manager.complete_drag(&mut graph, PortRef::new(l, "text"));
        assert!(matches!(outcome, DragOutcome::Aborted(GraphError::TypeMismatch { .. })));
        assert_eq!(graph, before);
        assert!(!manager.is_armed());

        manager.begin_drag(&graph, PortRef::new(a.clone(), "sum")).unwrap();
        assert!(manager.complete_drag(&mut graph, PortRef::new(b.clone(), "a")).is_committed());

        let before = graph.clone();
        manager.begin_drag(&graph, PortRef::new(a, "sum")).unwrap();
        let outcome = manager.complete_drag(&mut graph, PortRef::new(b, "a"));
        assert_eq!(outcome, DragOutcome::Aborted(GraphError::DuplicateConnection));
        assert_eq!(graph, before);
    }

    #[test]
    fn abort_discards_candidate() {
        let mut graph = graph();
        let a = graph.add_node("add", Position::default()).unwrap();
        let b = graph.add_node("add", Position::default()).unwrap();
        let mut manager = ConnectionManager::new();

        manager.begin_drag(&graph, PortRef::new(a, "sum")).unwrap();
        assert_eq!(manager.abort_drag(), DragOutcome::Cancelled);
        assert_eq!(manager.abort_drag(), DragOutcome::Ignored);
        assert_eq!(manager.complete_drag(&mut graph, PortRef::new(b, "a")), DragOutcome::Ignored);
        assert_eq!(graph.connections().count(), 0);
    }
}
