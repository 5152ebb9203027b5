//! Command-line companion to the graph editor.
//!
//! Fetches the stored tree, checks it against the catalog and prints a summary.
//!
//! Usage: graph_sync [--settings <path>] [--export <path>] [--import <path>] [--remove <node id>]
//!                   [--clear] [--force]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use nodetree::models::{Catalog, GraphTree};
use nodetree::node_graph::{deserialize, serialize, validate_tree, Registry};
use nodetree::services::{export_tree, import_tree, HttpTreeStore, TreeStore};
use nodetree::settings::load_effective_settings;

#[derive(Debug, Default)]
struct Args {
    settings: Option<PathBuf>,
    export: Option<PathBuf>,
    import: Option<PathBuf>,
    remove: Vec<String>,
    clear: bool,
    force: bool,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args::default();
    while let Some(arg) = args.next() {
        let mut path_for = |flag: &str| {
            args.next()
                .map(PathBuf::from)
                .ok_or_else(|| format!("{} needs a path", flag))
        };
        match arg.as_str() {
            "--settings" => parsed.settings = Some(path_for("--settings")?),
            "--export" => parsed.export = Some(path_for("--export")?),
            "--import" => parsed.import = Some(path_for("--import")?),
            "--remove" => parsed
                .remove
                .push(args.next().ok_or_else(|| "--remove needs a node id".to_string())?),
            "--clear" => parsed.clear = true,
            "--force" => parsed.force = true,
            other => return Err(format!("Unknown argument '{}'", other)),
        }
    }
    if parsed.clear && parsed.import.is_some() {
        return Err("--clear and --import are mutually exclusive".to_string());
    }
    if parsed.clear && !parsed.remove.is_empty() {
        return Err("--clear and --remove are mutually exclusive".to_string());
    }
    Ok(parsed)
}

async fn load_catalog(store: &HttpTreeStore, path: Option<&Path>) -> Result<Catalog, String> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read catalog {}: {}", path.display(), e))?;
            Catalog::from_json(&json).map_err(|e| format!("Invalid catalog {}: {}", path.display(), e))
        }
        None => store.fetch_catalog().await.map_err(|e| e.to_string()),
    }
}

async fn run(args: Args) -> Result<(), String> {
    let settings = load_effective_settings(args.settings.as_deref())?;
    let force = args.force || settings.force_save;
    let store = HttpTreeStore::new(settings.store_url.clone());

    let catalog = load_catalog(&store, settings.catalog_path.as_deref()).await?;
    let registry = Arc::new(Registry::from_catalog(&catalog).map_err(|e| e.to_string())?);

    if let Some(path) = &args.import {
        let tree = import_tree(path).map_err(|e| e.to_string())?;
        let graph = deserialize(&tree, registry.clone()).map_err(|e| e.to_string())?;
        // Saving the normalized form fills in defaults the file left out.
        let tree = serialize(&graph);
        store.save(&tree, force).await.map_err(|e| e.to_string())?;
        log::info!("[graph_sync] imported {} nodes from {}", tree.nodes.len(), path.display());
    } else if args.clear {
        store.save(&GraphTree::empty(), force).await.map_err(|e| e.to_string())?;
        log::info!("[graph_sync] cleared stored graph");
    }

    let mut tree = store.load().await.map_err(|e| e.to_string())?;
    if !args.remove.is_empty() {
        let removed = remove_nodes(&mut tree, &args.remove);
        if removed > 0 {
            store.save(&tree, force).await.map_err(|e| e.to_string())?;
        }
        log::info!("[graph_sync] removed {} of {} requested nodes", removed, args.remove.len());
    }
    for (node_id, input, link) in tree.dangling_references() {
        log::warn!("[graph_sync] input '{}' of {} points at missing node {}", input, node_id, link.id);
    }
    if let Err(e) = validate_tree(&tree) {
        log::warn!("[graph_sync] stored tree is not valid: {}", e);
    }
    let graph = deserialize(&tree, registry.clone()).map_err(|e| format!("Stored graph does not load: {}", e))?;
    println!(
        "{} node types, {} nodes, {} connections",
        registry.len(),
        graph.len(),
        graph.connections().count()
    );

    if let Some(path) = &args.export {
        export_tree(&tree, path).map_err(|e| e.to_string())?;
    }
    Ok(())
}

/// Drops each id from the tree along with the links it fed. Unknown ids are skipped.
fn remove_nodes(tree: &mut GraphTree, ids: &[String]) -> usize {
    ids.iter()
        .filter(|id| match tree.remove_node(id) {
            Some(node) => {
                log::debug!("[graph_sync] removed {} ({})", node.id, node.type_id);
                true
            }
            None => {
                log::warn!("[graph_sync] no node {} in stored graph", id);
                false
            }
        })
        .count()
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = match parse_args(std::env::args().skip(1)) {
        Ok(args) => run(args).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        log::error!("[graph_sync] {}", e);
        std::process::exit(1);
    }
}
