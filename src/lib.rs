pub mod editor;
pub mod models;
pub mod node_graph;
pub mod services;
pub mod settings;

pub use editor::{Editor, EditorEvent, EditorOutcome};
pub use models::{Catalog, GraphTree};
pub use node_graph::{GraphError, GraphState, Registry};
pub use services::{Persister, StoreError, TreeStore};
pub use settings::SyncSettings;
