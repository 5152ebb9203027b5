use std::sync::Arc;
use std::time::Duration;

use nodetree::models::{Catalog, GraphTree, Position};
use nodetree::node_graph::{NodeId, PortRef, Registry, SettingAddress, WidgetInput};
use nodetree::services::{export_tree, import_tree, MemoryTreeStore, Persister};
use nodetree::{Editor, EditorEvent, EditorOutcome};
use serde_json::json;

const DEBOUNCE: Duration = Duration::from_millis(750);

fn registry() -> Arc<Registry> {
    let catalog: Catalog = serde_json::from_value(json!({
        "modules": [{
            "package": "opsi.math",
            "version": "1.0",
            "funcs": [
                {
                    "name": "Add",
                    "type": "add",
                    "settings": {"scale": {"type": "dec", "params": {"default": 1.0}}},
                    "inputs": {"a": {"type": "num"}, "b": {"type": "num"}},
                    "outputs": {"sum": {"type": "num"}}
                },
                {
                    "name": "Band",
                    "type": "band",
                    "settings": {"hue": {"type": "range", "params": {"min": 0, "max": 10}}},
                    "inputs": {},
                    "outputs": {"mask": {"type": "mbw"}}
                }
            ]
        }]
    }))
    .expect("catalog parses");
    Arc::new(Registry::from_catalog(&catalog).expect("catalog is valid"))
}

fn editor(store: &Arc<MemoryTreeStore>) -> Editor {
    Editor::new(registry(), Persister::spawn(store.clone(), DEBOUNCE, false))
}

fn add_node(editor: &mut Editor, type_id: &str) -> NodeId {
    let outcome = editor
        .dispatch(EditorEvent::AddNode {
            type_id: type_id.to_string(),
            position: Position::default(),
        })
        .expect("known type");
    match outcome {
        EditorOutcome::NodeAdded(id) => id,
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn five_keystrokes_persist_once_with_the_final_value() {
    let store = Arc::new(MemoryTreeStore::new());
    let mut editor = editor(&store);
    let node = add_node(&mut editor, "add");
    editor.flush().await;
    assert_eq!(store.write_count(), 1);

    let scale = SettingAddress::new(node.clone(), "scale");
    for text in ["0", "0.", "0.2", "0.25", "0.255"] {
        editor
            .dispatch(EditorEvent::EditSetting {
                address: scale.clone(),
                input: WidgetInput::Text(text.to_string()),
            })
            .expect("numeric text");
        tokio::time::sleep(Duration::from_millis(120)).await;
    }
    assert_eq!(store.write_count(), 1);

    tokio::time::sleep(DEBOUNCE).await;
    let writes = store.writes();
    assert_eq!(writes.len(), 2);
    let saved = writes[1].tree.node(node.as_str()).expect("node saved");
    assert_eq!(saved.settings["scale"], json!(0.255));
}

#[tokio::test]
async fn range_drag_then_release_persists_once() {
    let store = Arc::new(MemoryTreeStore::new());
    let mut editor = editor(&store);
    let node = add_node(&mut editor, "band");
    let hue = SettingAddress::new(node.clone(), "hue");

    assert_eq!(
        editor.tree().nodes[0].settings["hue"],
        json!({"min": 0.0, "max": 10.0})
    );

    for input in [
        WidgetInput::RangeTo { min: 1.0, max: 9.0 },
        WidgetInput::RangeTo { min: 2.0, max: 7.0 },
        WidgetInput::Release,
    ] {
        editor
            .dispatch(EditorEvent::EditSetting {
                address: hue.clone(),
                input,
            })
            .unwrap();
    }
    editor.flush().await;

    let writes = store.writes();
    assert_eq!(writes.len(), 2);
    assert_eq!(
        writes[1].tree.nodes[0].settings["hue"],
        json!({"min": 2.0, "max": 7.0})
    );
}

#[tokio::test]
async fn structural_writes_arrive_in_issue_order() {
    let store = Arc::new(MemoryTreeStore::new());
    let mut editor = editor(&store);
    let a = add_node(&mut editor, "add");
    let b = add_node(&mut editor, "add");
    editor
        .dispatch(EditorEvent::PointerDownOutput(PortRef::new(a.clone(), "sum")))
        .unwrap();
    editor
        .dispatch(EditorEvent::PointerUp {
            over: Some(PortRef::new(b.clone(), "a")),
        })
        .unwrap();
    editor.dispatch(EditorEvent::RemoveNode(a.clone())).unwrap();
    editor.flush().await;

    let sizes: Vec<(usize, usize)> = store
        .writes()
        .iter()
        .map(|w| {
            let links = w.tree.nodes.iter().map(|n| n.inputs.len()).sum();
            (w.tree.nodes.len(), links)
        })
        .collect();
    assert_eq!(sizes, vec![(1, 0), (2, 0), (2, 1), (1, 0)]);
    assert!(store.current().dangling_references().is_empty());
    assert_eq!(editor.tree(), store.current());
}

#[tokio::test]
async fn exported_file_replaces_a_graph() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.json");

    let store = Arc::new(MemoryTreeStore::new());
    let mut source = editor(&store);
    let a = add_node(&mut source, "add");
    let b = add_node(&mut source, "add");
    source
        .dispatch(EditorEvent::PointerDownOutput(PortRef::new(a, "sum")))
        .unwrap();
    source
        .dispatch(EditorEvent::PointerUp {
            over: Some(PortRef::new(b, "b")),
        })
        .unwrap();
    export_tree(&source.tree(), &path).unwrap();
    source.shutdown().await;

    let other_store = Arc::new(MemoryTreeStore::new());
    let mut target = editor(&other_store);
    let imported = import_tree(&path).unwrap();
    let outcome = target
        .dispatch(EditorEvent::ReplaceGraph(imported.clone()))
        .unwrap();
    assert_eq!(outcome, EditorOutcome::Replaced { nodes: 2 });
    target.flush().await;

    assert_eq!(target.tree(), imported);
    assert_eq!(other_store.current(), imported);
    assert_eq!(target.graph().connections().count(), 1);
}

#[tokio::test]
async fn editor_loads_what_the_store_holds() {
    let stored: GraphTree = serde_json::from_value(json!({
        "nodes": [
            {"type": "add", "id": "x", "position": [10, 10], "settings": {"scale": "2.5"}},
            {"type": "add", "id": "y", "pos": [90, 10], "inputs": {"a": {"id": "x", "name": "sum"}}}
        ]
    }))
    .unwrap();
    let store = Arc::new(MemoryTreeStore::with_tree(stored));
    let tree = nodetree::TreeStore::load(store.as_ref()).await.unwrap();

    let editor = Editor::load(
        &tree,
        registry(),
        Persister::spawn(store.clone(), DEBOUNCE, false),
    )
    .expect("stored tree loads");
    let saved = editor.tree();
    assert_eq!(saved.nodes[0].settings["scale"], json!(2.5));
    assert_eq!(saved.nodes[1].settings["scale"], json!(1.0));
    assert_eq!(saved.nodes[1].inputs["a"].id, "x");
    assert_eq!(saved.nodes[1].position, Position::new(90.0, 10.0));
}
