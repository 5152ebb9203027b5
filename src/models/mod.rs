pub mod catalog;
pub mod node_tree;

pub use catalog::{Catalog, FunctionDescriptor, IoDescriptor, ModuleDescriptor};
pub use node_tree::{GraphTree, InputLink, Position, TreeNode};
