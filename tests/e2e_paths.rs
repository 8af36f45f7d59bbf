//! End-to-end integration tests for the all-paths engine (§8 S5, B4, B5)
//! against the public `Engine`/`Graph`/`AllPaths` API.

use propgraph_core::model::{Direction, PropertyMap};
use propgraph_core::paths::{AllPaths, UNBOUNDED};
use propgraph_core::{Engine, EngineConfig};

fn directed_square() -> (Engine, std::sync::Arc<propgraph_core::Graph>, Vec<propgraph_core::model::NodeId>) {
    let engine = Engine::new(EngineConfig::default());
    let g = engine.create_graph("square").unwrap();
    let r = g.get_or_add_relation("R");
    let nodes: Vec<_> = (0..4).map(|_| g.create_node(vec![], PropertyMap::new())).collect();
    for (s, d) in [(0, 1), (0, 2), (1, 0), (1, 2), (2, 1), (2, 3), (3, 0)] {
        g.create_edge(nodes[s], nodes[d], r, PropertyMap::new()).unwrap();
    }
    (engine, g, nodes)
}

// ============================================================================
// 1. B4 — min = 0 always yields a single zero-length path from a live source.
// ============================================================================

#[test]
fn b4_zero_length_path_when_min_is_zero() {
    let (_engine, g, nodes) = directed_square();
    let mut it = AllPaths::init(&g, nodes[0], None, None, Direction::Out, 0, UNBOUNDED).unwrap();
    let first = it.next().unwrap();
    assert_eq!(first.len(), 0);
    assert_eq!(first.start().id, nodes[0]);
}

// ============================================================================
// 2. B5 — min = max = 0 with source = destination yields exactly that one
//    trivial path.
// ============================================================================

#[test]
fn b5_min_max_zero_with_self_destination_yields_exactly_one_path() {
    let (_engine, g, nodes) = directed_square();
    let mut it = AllPaths::init(&g, nodes[0], Some(nodes[0]), None, Direction::Out, 0, 0).unwrap();
    let first = it.next().unwrap();
    assert_eq!(first.len(), 0);
    assert!(it.next().is_none());
}

// ============================================================================
// 3. S5 — destination-bounded enumeration from node 0 back to node 0.
// ============================================================================

#[test]
fn s5_all_paths_from_zero_to_zero() {
    let (_engine, g, nodes) = directed_square();
    let paths: Vec<_> = AllPaths::init(&g, nodes[0], Some(nodes[0]), None, Direction::Out, 0, UNBOUNDED)
        .unwrap()
        .collect();

    let ids = |p: &propgraph_core::model::Path| -> Vec<u64> { p.nodes.iter().map(|n| n.id.0).collect() };
    let mut sequences: Vec<Vec<u64>> = paths.iter().map(ids).collect();
    sequences.sort();

    let mut expected = vec![
        vec![0u64],
        vec![0, 1, 0],
        vec![0, 1, 2, 1, 0],
        vec![0, 2, 1, 0],
        vec![0, 2, 3, 0],
    ];
    expected.sort();
    assert_eq!(sequences, expected);

    for p in &paths {
        assert_eq!(p.start().id, nodes[0]);
        assert_eq!(p.end().id, nodes[0]);
        // No edge repeats within a single path.
        let edge_ids = p.edge_ids();
        let mut dedup = edge_ids.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(edge_ids.len(), dedup.len(), "a path must be simple w.r.t. edges");
    }
}

// ============================================================================
// 4. A destination filter only returns paths actually ending there.
// ============================================================================

#[test]
fn destination_filter_only_returns_matching_paths() {
    let (_engine, g, nodes) = directed_square();
    let paths: Vec<_> = AllPaths::init(&g, nodes[0], Some(nodes[3]), None, Direction::Out, 0, 3)
        .unwrap()
        .collect();

    assert!(!paths.is_empty());
    for p in &paths {
        assert_eq!(p.end().id, nodes[3]);
    }
}

// ============================================================================
// 5. A min bound higher than every reachable path length yields nothing.
// ============================================================================

#[test]
fn no_paths_when_min_exceeds_every_reachable_length() {
    let (_engine, g, nodes) = directed_square();
    let mut it = AllPaths::init(&g, nodes[0], None, None, Direction::Out, 999, 1000).unwrap();
    assert!(it.next().is_none());
}

// ============================================================================
// 6. Initializing a path iterator on a deleted source fails `InvalidId`.
// ============================================================================

#[test]
fn init_rejects_a_deleted_source() {
    let (_engine, g, nodes) = directed_square();
    g.bulk_delete(&[nodes[0]], &[]);
    let err = AllPaths::init(&g, nodes[0], None, None, Direction::Out, 0, UNBOUNDED).unwrap_err();
    assert!(matches!(err, propgraph_core::Error::InvalidId { kind: "node", .. }));
}
