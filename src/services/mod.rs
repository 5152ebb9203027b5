pub mod files;
pub mod persistence;
pub mod store;

pub use files::{export_tree, import_tree};
pub use persistence::Persister;
pub use store::{HttpTreeStore, MemoryTreeStore, StoreError, StoredWrite, TreeStore};
