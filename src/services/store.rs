// Graph tree persistence backends.

use async_trait::async_trait;
use reqwest::Client;
use std::fmt;
use std::sync::Mutex;

use crate::models::{Catalog, GraphTree};
use crate::node_graph::validate_tree;

/// Error type for tree store and file operations
#[derive(Debug)]
pub enum StoreError {
    /// HTTP request failed
    RequestFailed(String),
    /// Store answered with a non-success status
    ApiError { status: u16, message: String },
    /// Failed to parse a response or document
    ParseError(String),
    /// Store refused the tree (validation failed and force was not set)
    Rejected(String),
    Io(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::RequestFailed(msg) => write!(f, "Request failed: {}", msg),
            StoreError::ApiError { status, message } => {
                write!(f, "Store API error {}: {}", status, message)
            }
            StoreError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            StoreError::Rejected(msg) => write!(f, "Tree rejected: {}", msg),
            StoreError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Whole-tree persistence. `save` replaces the stored tree and is idempotent.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// The stored tree, or an empty one when nothing was saved yet.
    async fn load(&self) -> Result<GraphTree, StoreError>;

    /// `force` asks the store to skip its own validation.
    async fn save(&self, tree: &GraphTree, force: bool) -> Result<(), StoreError>;
}

/// REST client for a store exposing `GET/POST {base}/nodes` and `GET {base}/funcs`.
pub struct HttpTreeStore {
    client: Client,
    base_url: String,
}

impl HttpTreeStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the node-type catalog served next to the tree.
    pub async fn fetch_catalog(&self) -> Result<Catalog, StoreError> {
        let url = format!("{}/funcs", self.base_url);
        let body = self.get_text(&url).await?;
        serde_json::from_str(&body)
            .map_err(|e| StoreError::ParseError(format!("Failed to parse catalog: {}", e)))
    }

    async fn get_text(&self, url: &str) -> Result<String, StoreError> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StoreError::RequestFailed(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let text = res.text().await.unwrap_or_default();
            return Err(StoreError::ApiError {
                status,
                message: text,
            });
        }

        res.text()
            .await
            .map_err(|e| StoreError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl TreeStore for HttpTreeStore {
    async fn load(&self) -> Result<GraphTree, StoreError> {
        let url = format!("{}/nodes", self.base_url);
        let body = self.get_text(&url).await?;
        if body.trim().is_empty() || body.trim() == "null" {
            return Ok(GraphTree::empty());
        }
        serde_json::from_str(&body)
            .map_err(|e| StoreError::ParseError(format!("Failed to parse tree: {}", e)))
    }

    async fn save(&self, tree: &GraphTree, force: bool) -> Result<(), StoreError> {
        let url = if force {
            format!("{}/nodes?force=true", self.base_url)
        } else {
            format!("{}/nodes", self.base_url)
        };

        let res = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(tree)
            .send()
            .await
            .map_err(|e| StoreError::RequestFailed(e.to_string()))?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let text = res.text().await.unwrap_or_default();
            return Err(StoreError::ApiError {
                status,
                message: text,
            });
        }

        log::debug!("[store] saved {} nodes to {}", tree.nodes.len(), url);
        Ok(())
    }
}

/// One accepted `save` call.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredWrite {
    pub tree: GraphTree,
    pub force: bool,
}

/// In-process store. Validates like the server does and keeps every
/// accepted write in order.
#[derive(Debug, Default)]
pub struct MemoryTreeStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    current: GraphTree,
    writes: Vec<StoredWrite>,
}

impl MemoryTreeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree(tree: GraphTree) -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                current: tree,
                writes: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryInner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Io("memory store poisoned".to_string()))
    }

    /// Accepted writes, oldest first.
    pub fn writes(&self) -> Vec<StoredWrite> {
        self.lock().map(|inner| inner.writes.clone()).unwrap_or_default()
    }

    pub fn write_count(&self) -> usize {
        self.lock().map(|inner| inner.writes.len()).unwrap_or(0)
    }

    pub fn current(&self) -> GraphTree {
        self.lock().map(|inner| inner.current.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TreeStore for MemoryTreeStore {
    async fn load(&self) -> Result<GraphTree, StoreError> {
        Ok(self.lock()?.current.clone())
    }

    async fn save(&self, tree: &GraphTree, force: bool) -> Result<(), StoreError> {
        if !force {
            validate_tree(tree).map_err(|e| StoreError::Rejected(e.to_string()))?;
        }
        let mut inner = self.lock()?;
        inner.current = tree.clone();
        inner.writes.push(StoredWrite {
            tree: tree.clone(),
            force,
        });
        Ok(())
    }
}
