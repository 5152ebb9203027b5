use std::fs;
use std::path::Path;

use super::store::StoreError;
use crate::models::GraphTree;

/// Write `tree` to `path` as pretty-printed JSON, creating parent directories.
pub fn export_tree(tree: &GraphTree, path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| StoreError::Io(format!("{}: {}", parent.display(), e)))?;
    }
    let json = serde_json::to_string_pretty(tree)
        .map_err(|e| StoreError::ParseError(e.to_string()))?;
    fs::write(path, json).map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))?;
    log::info!("[files] exported {} nodes to {}", tree.nodes.len(), path.display());
    Ok(())
}

pub fn import_tree(path: &Path) -> Result<GraphTree, StoreError> {
    let json = fs::read_to_string(path)
        .map_err(|e| StoreError::Io(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&json)
        .map_err(|e| StoreError::ParseError(format!("{}: {}", path.display(), e)))
}
