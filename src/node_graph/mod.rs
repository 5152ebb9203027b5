mod connections;
mod error;
mod node;
mod registry;
mod state;
mod sync;
mod validation;
mod widgets;

pub use connections::{Connection, ConnectionManager, DragOutcome, DragState, PortRef};
pub use error::GraphError;
pub use node::{NodeId, NodeInstance, Port};
pub use registry::{DataType, NodeType, PortDirection, Registry, SettingKind, SettingSpec};
pub use state::{GraphState, RemovedNode};
pub use sync::{deserialize, serialize};
pub use validation::{validate_tree, TreeValidationError};
pub use widgets::{EditOutcome, PersistMode, SettingAddress, SettingValue, SettingWidget, WidgetInput};

#[cfg(test)]
mod tests;
