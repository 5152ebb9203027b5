//! Event dispatcher for the graph editor.
//!
//! Every user gesture arrives as an [`EditorEvent`]. The editor applies it to
//! the single [`GraphState`], drives the connection gesture state machine,
//! and hands a fresh tree snapshot to the [`Persister`]: immediately for
//! structural edits and committed settings, debounced for typing.

use std::sync::Arc;

use crate::models::{GraphTree, Position};
use crate::node_graph::{
    deserialize, serialize, Connection, ConnectionManager, DragOutcome, EditOutcome, GraphError,
    GraphState, NodeId, PersistMode, PortRef, Registry, RemovedNode, SettingAddress, WidgetInput,
};
use crate::services::Persister;

#[derive(Clone, Debug, PartialEq)]
pub enum EditorEvent {
    AddNode { type_id: String, position: Position },
    /// Node drag ended at `position`.
    MoveNode { id: NodeId, position: Position },
    RemoveNode(NodeId),
    /// Pointer pressed on an output port: starts a connection drag.
    PointerDownOutput(PortRef),
    /// Pointer pressed on an input port: frees it.
    PointerDownInput(PortRef),
    /// Pointer released, over an input port or over nothing.
    PointerUp { over: Option<PortRef> },
    EditSetting { address: SettingAddress, input: WidgetInput },
    ClearGraph,
    /// Swap in a whole tree, e.g. from an imported file.
    ReplaceGraph(GraphTree),
}

#[derive(Clone, Debug, PartialEq)]
pub enum EditorOutcome {
    NodeAdded(NodeId),
    NodeMoved,
    NodeRemoved(Option<RemovedNode>),
    DragStarted,
    DragEnded(DragOutcome),
    Disconnected(Option<Connection>),
    SettingEdited(EditOutcome),
    Cleared,
    Replaced { nodes: usize },
}

pub struct Editor {
    graph: GraphState,
    connections: ConnectionManager,
    persister: Persister,
}

impl Editor {
    pub fn new(registry: Arc<Registry>, persister: Persister) -> Self {
        Self {
            graph: GraphState::new(registry),
            connections: ConnectionManager::new(),
            persister,
        }
    }

    /// Builds the editor from a stored tree. Load errors are returned, not
    /// papered over by dropping nodes.
    pub fn load(tree: &GraphTree, registry: Arc<Registry>, persister: Persister) -> Result<Self, GraphError> {
        let graph = deserialize(tree, registry)?;
        log::info!("[editor] loaded graph with {} nodes", graph.len());
        Ok(Self {
            graph,
            connections: ConnectionManager::new(),
            persister,
        })
    }

    pub fn graph(&self) -> &GraphState {
        &self.graph
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn tree(&self) -> GraphTree {
        serialize(&self.graph)
    }

    pub fn dispatch(&mut self, event: EditorEvent) -> Result<EditorOutcome, GraphError> {
        let outcome = match event {
            EditorEvent::AddNode { type_id, position } => {
                let id = self.graph.add_node(&type_id, position)?;
                self.persist_now();
                EditorOutcome::NodeAdded(id)
            }
            EditorEvent::MoveNode { id, position } => {
                self.graph.move_node(&id, position)?;
                self.persist_now();
                EditorOutcome::NodeMoved
            }
            EditorEvent::RemoveNode(id) => {
                let removed = self.graph.remove_node(&id);
                if removed.is_some() {
                    self.persist_now();
                }
                EditorOutcome::NodeRemoved(removed)
            }
            EditorEvent::PointerDownOutput(source) => {
                self.connections.begin_drag(&self.graph, source)?;
                EditorOutcome::DragStarted
            }
            EditorEvent::PointerDownInput(input) => {
                self.connections.abort_drag();
                let removed = self.graph.disconnect_input(&input);
                if removed.is_some() {
                    self.persist_now();
                }
                EditorOutcome::Disconnected(removed)
            }
            EditorEvent::PointerUp { over: Some(target) } => {
                let outcome = self.connections.complete_drag(&mut self.graph, target);
                if outcome.is_committed() {
                    self.persist_now();
                }
                EditorOutcome::DragEnded(outcome)
            }
            EditorEvent::PointerUp { over: None } => {
                EditorOutcome::DragEnded(self.connections.abort_drag())
            }
            EditorEvent::EditSetting { address, input } => {
                let edit = self.graph.edit_setting(&address, input)?;
                match edit.persist {
                    PersistMode::Immediate => self.persist_now(),
                    PersistMode::Debounced => self.persister.persist_debounced(self.tree()),
                    PersistMode::None => {}
                }
                EditorOutcome::SettingEdited(edit)
            }
            EditorEvent::ClearGraph => {
                self.connections.abort_drag();
                self.graph.clear();
                self.persist_now();
                EditorOutcome::Cleared
            }
            EditorEvent::ReplaceGraph(tree) => {
                let graph = deserialize(&tree, self.graph.registry().clone())?;
                self.connections.abort_drag();
                self.graph = graph;
                self.persist_now();
                EditorOutcome::Replaced {
                    nodes: self.graph.len(),
                }
            }
        };
        Ok(outcome)
    }

    fn persist_now(&self) {
        self.persister.persist_now(self.tree());
    }

    /// Push any pending debounced snapshot and wait for queued writes.
    pub async fn flush(&self) {
        self.persister.flush().await;
    }

    pub async fn shutdown(self) {
        self.persister.shutdown().await;
    }
}
