//! End-to-end integration tests for the basic node/edge lifecycle (§8 S1,
//! S2, S4) against the public `Engine`/`Graph` API.
//!
//! Each test drives the engine the way an external query layer would:
//! register a graph, resolve label/relation names, create and delete
//! entities, and read back the counts and matrices the invariants in §3
//! and §8 talk about.

use propgraph_core::model::property_map::property_map;
use propgraph_core::model::{Direction, PropertyMap};
use propgraph_core::{Engine, EngineConfig};

fn engine() -> Engine {
    Engine::new(EngineConfig::default())
}

// ============================================================================
// 1. S1 — simple lifecycle: three nodes, one relation, three edges.
// ============================================================================

#[test]
fn s1_simple_lifecycle() {
    let engine = engine();
    let g = engine.create_graph("s1").unwrap();
    let r = g.get_or_add_relation("R");

    let n0 = g.create_node(vec![], PropertyMap::new());
    let n1 = g.create_node(vec![], PropertyMap::new());
    let n2 = g.create_node(vec![], PropertyMap::new());

    g.create_edge(n0, n1, r, PropertyMap::new()).unwrap();
    g.create_edge(n0, n2, r, PropertyMap::new()).unwrap();
    g.create_edge(n1, n2, r, PropertyMap::new()).unwrap();

    assert_eq!(g.node_count(), 3);
    assert_eq!(g.edge_count(), 3);
}

// ============================================================================
// 2. S2 — multi-edge promotion and demotion between two nodes.
// ============================================================================

#[test]
fn s2_multi_edge_promotion_and_demotion() {
    let engine = engine();
    let g = engine.create_graph("s2").unwrap();
    let r = g.get_or_add_relation("R");
    let n0 = g.create_node(vec![], PropertyMap::new());
    let n1 = g.create_node(vec![], PropertyMap::new());

    let e1 = g.create_edge(n0, n1, r, PropertyMap::new()).unwrap();
    let e2 = g.create_edge(n0, n1, r, PropertyMap::new()).unwrap();

    let between = g.get_edges_connecting(n0, n1, None, Direction::Out);
    assert_eq!(between.len(), 2, "promotion to a multi-edge cell must not drop either edge");

    g.delete_edge(e1).unwrap();
    let between = g.get_edges_connecting(n0, n1, None, Direction::Out);
    assert_eq!(between.len(), 1);
    assert_eq!(between[0].id, e2, "demotion must keep the remaining edge, not drop it");

    g.delete_edge(e2).unwrap();
    assert!(g.get_edges_connecting(n0, n1, None, Direction::Out).is_empty());
}

// ============================================================================
// 3. S4 — detach every incident edge, then delete the node manually.
// ============================================================================

#[test]
fn s4_remove_node_with_edges_manually_detached() {
    let engine = engine();
    let g = engine.create_graph("s4").unwrap();
    let r = g.get_or_add_relation("R");
    let n0 = g.create_node(vec![], PropertyMap::new());
    let n1 = g.create_node(vec![], PropertyMap::new());
    let n2 = g.create_node(vec![], PropertyMap::new());

    g.create_edge(n0, n1, r, PropertyMap::new()).unwrap();
    g.create_edge(n1, n0, r, PropertyMap::new()).unwrap();
    g.create_edge(n1, n2, r, PropertyMap::new()).unwrap();

    let incident = g.get_node_edges(n0, Direction::Both, None);
    assert_eq!(incident.len(), 2);
    for e in &incident {
        g.delete_edge(e.id).unwrap();
    }
    g.delete_node(n0).unwrap();

    assert_eq!(g.node_count(), 2);
    assert_eq!(g.edge_count(), 1);
    assert!(g.get_node(n0).is_err(), "deleted node must report missing, not stale state");
}

// ============================================================================
// 4. Properties and labels survive a node read-back (P4: label matrix
//    mirrors the node's label set exactly).
// ============================================================================

#[test]
fn node_properties_and_labels_round_trip_through_get_node() {
    let engine = engine();
    let g = engine.create_graph("props").unwrap();
    let person = g.get_or_add_label("Person");
    let n0 = g.create_node(vec![person], property_map([("name", "Ada"), ("city", "London")]));

    let node = g.get_node(n0).unwrap();
    assert!(node.has_label(person));
    assert_eq!(node.get("name").unwrap().as_str(), Some("Ada"));
    assert_eq!(node.get("city").unwrap().as_str(), Some("London"));
}

// ============================================================================
// 5. Creating an edge between an unknown node id fails `InvalidId`, and
//    leaves the graph untouched (§7: writers restore prior state on
//    failure).
// ============================================================================

#[test]
fn create_edge_with_unknown_endpoint_leaves_graph_untouched() {
    let engine = engine();
    let g = engine.create_graph("invalid").unwrap();
    let r = g.get_or_add_relation("R");
    let n0 = g.create_node(vec![], PropertyMap::new());

    let err = g
        .create_edge(n0, propgraph_core::model::NodeId(9999), r, PropertyMap::new())
        .unwrap_err();
    assert!(matches!(err, propgraph_core::Error::InvalidId { kind: "node", .. }));
    assert_eq!(g.edge_count(), 0);
}

// ============================================================================
// 6. A graph looked up by an engine-assigned name reflects writes made
//    through any handle to it (same underlying `Arc<Graph>`).
// ============================================================================

#[test]
fn engine_registry_shares_one_graph_across_handles() {
    let engine = engine();
    let created = engine.create_graph("shared").unwrap();
    created.create_node(vec![], PropertyMap::new());

    let looked_up = engine.get_graph("shared").unwrap();
    assert_eq!(looked_up.node_count(), 1);
}
