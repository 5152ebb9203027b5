use super::{
    deserialize, serialize, ConnectionManager, DragOutcome, GraphError, GraphState, PersistMode,
    PortRef, Registry, SettingAddress, SettingValue, WidgetInput,
};
use crate::models::{Catalog, Position};
use serde_json::json;
use std::sync::Arc;

fn catalog() -> Catalog {
    serde_json::from_value(json!({
        "funcs": [
            {
                "name": "Add",
                "type": "add",
                "inputs": {"a": {"type": "num"}, "b": {"type": "num"}},
                "outputs": {"sum": {"type": "num"}}
            },
            {
                "name": "Format",
                "type": "fmt",
                "settings": {
                    "pattern": {"type": "str", "params": {"default": "{}"}},
                    "upper": {"type": "bol", "params": {"default": "false"}}
                },
                "inputs": {"text": {"type": "str"}},
                "outputs": {"text": {"type": "str"}}
            }
        ],
        "modules": [{
            "package": "opsi.cv",
            "version": "2",
            "funcs": [{
                "name": "Threshold",
                "type": "cv.Threshold",
                "settings": {
                    "hue": {"type": "range", "params": {"min": 0, "max": 10}},
                    "level": {"type": "slide", "params": {"min": 0, "max": 4}},
                    "mode": {"type": "box", "params": {"options": ["RGB", "HSV"]}},
                    "scale": {"type": "dec"},
                    "count": {"type": "int", "params": {"default": 3}}
                },
                "inputs": {"img": {"type": "mat"}, "gain": {"type": "num"}},
                "outputs": {"img": {"type": "mat"}, "area": {"type": "num"}}
            }]
        }]
    }))
    .expect("catalog parses")
}

fn registry() -> Arc<Registry> {
    Arc::new(Registry::from_catalog(&catalog()).expect("catalog is valid"))
}

fn drag(graph: &mut GraphState, source: PortRef, target: PortRef) -> DragOutcome {
    let mut manager = ConnectionManager::new();
    manager.begin_drag(graph, source).expect("source is an output");
    manager.complete_drag(graph, target)
}

#[test]
fn add_nodes_serialize_their_link() {
    let mut graph = GraphState::new(registry());
    let a = graph.add_node("add", Position::new(0.0, 0.0)).unwrap();
    let b = graph.add_node("add", Position::new(200.0, 0.0)).unwrap();

    let outcome = drag(&mut graph, PortRef::new(a.clone(), "sum"), PortRef::new(b.clone(), "a"));
    assert!(outcome.is_committed());

    let tree = serialize(&graph);
    let link = &tree.node(b.as_str()).unwrap().inputs["a"];
    assert_eq!(link.id, a.as_str());
    assert_eq!(link.name, "sum");
}

#[test]
fn num_output_into_str_input_is_rejected() {
    let mut graph = GraphState::new(registry());
    let a = graph.add_node("add", Position::default()).unwrap();
    let f = graph.add_node("fmt", Position::default()).unwrap();
    let before = serialize(&graph);

    let outcome = drag(&mut graph, PortRef::new(a, "sum"), PortRef::new(f, "text"));
    assert!(matches!(outcome, DragOutcome::Aborted(GraphError::TypeMismatch { .. })));
    assert_eq!(serialize(&graph), before);
}

#[test]
fn equal_types_commit_and_unequal_types_never_mutate() {
    let registry = registry();
    let mut graph = GraphState::new(registry.clone());
    let ids: Vec<_> = registry
        .node_types()
        .iter()
        .map(|node_type| graph.add_node(&node_type.type_id, Position::default()).unwrap())
        .collect();

    for source_node in graph.nodes().to_vec() {
        for output in source_node.outputs() {
            for target_id in &ids {
                let inputs = graph.node(target_id).unwrap().inputs().to_vec();
                for input in inputs {
                    let source = source_node.port_ref(&output.key);
                    let target = PortRef::new(target_id.clone(), input.key.clone());
                    let before = graph.clone();
                    let previous = graph.node(target_id).unwrap().incoming(&input.key).cloned();

                    match drag(&mut graph, source.clone(), target.clone()) {
                        DragOutcome::Committed { connection, evicted } => {
                            assert_eq!(output.data_type, input.data_type);
                            assert_eq!(connection.source, source);
                            assert_eq!(evicted, previous);
                            let occupant = graph.node(target_id).unwrap().incoming(&input.key);
                            assert_eq!(occupant, Some(&connection));
                        }
                        DragOutcome::Aborted(GraphError::DuplicateConnection) => {
                            assert_eq!(previous.map(|c| c.source), Some(source));
                            assert_eq!(graph, before);
                        }
                        DragOutcome::Aborted(err) => {
                            assert_ne!(output.data_type, input.data_type, "{}", err);
                            assert_eq!(graph, before);
                        }
                        DragOutcome::Ignored | DragOutcome::Cancelled => panic!("drag was armed"),
                    }
                }
            }
        }
    }
}

#[test]
fn round_trip_preserves_positions_settings_and_edges() {
    let registry = registry();
    let mut graph = GraphState::new(registry.clone());
    let t = graph.add_node("cv.Threshold", Position::new(12.5, -3.0)).unwrap();
    let a = graph.add_node("add", Position::new(40.0, 80.0)).unwrap();
    let b = graph.add_node("add", Position::new(90.0, 80.0)).unwrap();
    let f = graph.add_node("fmt", Position::default()).unwrap();

    graph.connect(PortRef::new(t.clone(), "area"), PortRef::new(a.clone(), "a")).unwrap();
    graph.connect(PortRef::new(t.clone(), "area"), PortRef::new(a.clone(), "b")).unwrap();
    graph.connect(PortRef::new(a.clone(), "sum"), PortRef::new(b.clone(), "a")).unwrap();
    graph.connect(PortRef::new(b, "sum"), PortRef::new(t.clone(), "gain")).unwrap();

    graph.set_setting(&SettingAddress::new(t.clone(), "hue"), SettingValue::Range { min: 2.0, max: 7.0 }).unwrap();
    graph.set_setting(&SettingAddress::new(t.clone(), "mode"), SettingValue::Choice("HSV".into())).unwrap();
    graph.set_setting(&SettingAddress::new(t.clone(), "scale"), SettingValue::Decimal(0.25)).unwrap();
    graph.set_setting(&SettingAddress::new(f.clone(), "upper"), SettingValue::Boolean(true)).unwrap();
    graph.set_setting(&SettingAddress::new(f, "pattern"), SettingValue::Str("<{}>".into())).unwrap();

    let tree = serialize(&graph);
    let reloaded = deserialize(&tree, registry.clone()).expect("tree loads");
    assert_eq!(reloaded, graph);

    // Through JSON as well, the way the store sees it.
    let wire = serde_json::to_string(&tree).unwrap();
    let reloaded = deserialize(&serde_json::from_str(&wire).unwrap(), registry).unwrap();
    assert_eq!(reloaded, graph);
}

#[test]
fn catalog_defaults_are_applied() {
    let mut graph = GraphState::new(registry());
    let t = graph.add_node("cv.Threshold", Position::default()).unwrap();
    let f = graph.add_node("fmt", Position::default()).unwrap();
    let value = |graph: &GraphState, id, key: &str| {
        graph.setting_value(&SettingAddress::new(id, key)).unwrap().clone()
    };

    assert_eq!(value(&graph, t.clone(), "hue"), SettingValue::Range { min: 0.0, max: 10.0 });
    assert_eq!(value(&graph, t.clone(), "level"), SettingValue::Slide(2.0));
    assert_eq!(value(&graph, t.clone(), "mode"), SettingValue::Choice("RGB".into()));
    assert_eq!(value(&graph, t.clone(), "scale"), SettingValue::Decimal(0.0));
    assert_eq!(value(&graph, t, "count"), SettingValue::Int(3));
    assert_eq!(value(&graph, f.clone(), "upper"), SettingValue::Boolean(false));
    assert_eq!(value(&graph, f, "pattern"), SettingValue::Str("{}".into()));
}

#[test]
fn removing_a_node_leaves_no_dangling_links() {
    let mut graph = GraphState::new(registry());
    let a = graph.add_node("add", Position::default()).unwrap();
    let b = graph.add_node("add", Position::default()).unwrap();
    let c = graph.add_node("add", Position::default()).unwrap();
    graph.connect(PortRef::new(a.clone(), "sum"), PortRef::new(b.clone(), "a")).unwrap();
    graph.connect(PortRef::new(a.clone(), "sum"), PortRef::new(c.clone(), "b")).unwrap();
    graph.connect(PortRef::new(b.clone(), "sum"), PortRef::new(c.clone(), "a")).unwrap();

    graph.remove_node(&a).expect("present");
    assert!(graph.connections().all(|edge| !edge.touches(&a)));

    let tree = serialize(&graph);
    assert!(tree.dangling_references().is_empty());
    assert_eq!(tree.node(c.as_str()).unwrap().inputs.len(), 1);
    assert!(tree.node(b.as_str()).unwrap().inputs.is_empty());
}

#[test]
fn stale_catalog_fails_the_load() {
    let mut graph = GraphState::new(registry());
    let a = graph.add_node("add", Position::default()).unwrap();
    let b = graph.add_node("add", Position::default()).unwrap();
    graph.connect(PortRef::new(a, "sum"), PortRef::new(b, "a")).unwrap();
    let tree = serialize(&graph);

    // "add" now produces text.
    let changed: Catalog = serde_json::from_value(json!({
        "funcs": [{
            "name": "Add",
            "type": "add",
            "inputs": {"a": {"type": "num"}, "b": {"type": "num"}},
            "outputs": {"sum": {"type": "str"}}
        }]
    }))
    .unwrap();
    let stale = Arc::new(Registry::from_catalog(&changed).unwrap());
    assert!(matches!(
        deserialize(&tree, stale),
        Err(GraphError::TypeMismatch { .. })
    ));

    let mut tree = tree;
    tree.nodes.remove(0);
    assert!(matches!(
        deserialize(&tree, registry()),
        Err(GraphError::DanglingReference { .. })
    ));
}

#[test]
fn range_drag_commits_once_on_release() {
    let mut graph = GraphState::new(registry());
    let t = graph.add_node("cv.Threshold", Position::default()).unwrap();
    let hue = SettingAddress::new(t, "hue");

    let mut commits = Vec::new();
    for input in [
        WidgetInput::RangeTo { min: 1.0, max: 9.0 },
        WidgetInput::RangeTo { min: 2.0, max: 8.0 },
        WidgetInput::RangeTo { min: 2.0, max: 7.0 },
        WidgetInput::Release,
    ] {
        let outcome = graph.edit_setting(&hue, input).unwrap();
        if outcome.persist != PersistMode::None {
            commits.push(serialize(&graph));
        }
    }

    assert_eq!(commits.len(), 1);
    let settings = &commits[0].nodes[0].settings;
    assert_eq!(settings["hue"], json!({"min": 2.0, "max": 7.0}));
}
