//! # Algorithm adapters (C8, §4.8)
//!
//! Each adapter builds an "effective adjacency" matrix — the boolean union
//! of the selected `R_t` relation matrices, optionally pre/post-filtered by
//! the union of selected `L_k` label matrices (`L·A·L`), optionally with
//! the diagonal cleared — then runs a traversal or iterative algorithm over
//! it. Grounded on `examples/original_source/src/procedures/proc_bfs_tree.c`
//! (BFS-tree: parent vector + per-node level, level 0 excluded) and
//! `proc_cdlp.c` (label propagation: max-iterations default of 10 when the
//! caller passes 0, self-loops excluded, optional label filter).

use std::collections::{HashMap, VecDeque};

use petgraph::graphmap::DiGraphMap;

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::matrix::{BoolMatrix, SelectPredicate};
use crate::model::{LabelId, NodeId, RelationId};

/// Selects which relation/label matrices feed an adapter's effective
/// adjacency, and whether self-loops survive (§4.8).
#[derive(Debug, Clone, Default)]
pub struct AdjacencyOptions<'a> {
    /// `None` means "every relation type" (the full adjacency matrix `A`).
    pub relations: Option<&'a [RelationId]>,
    /// `None` means "no label filter" — skip the `L·A·L` step entirely.
    pub labels: Option<&'a [LabelId]>,
    pub exclude_self_loops: bool,
}

/// Unions the patterns of the selected relation matrices, applies the
/// optional `L·A·L` label filter, then optionally clears the diagonal.
fn effective_adjacency(graph: &Graph, opts: &AdjacencyOptions<'_>) -> BoolMatrix {
    let dim = graph.matrix_dim();
    let relation_ids: Vec<RelationId> = match opts.relations {
        Some(rs) => rs.to_vec(),
        None => graph.all_relation_ids(),
    };

    let mut a = BoolMatrix::new(dim);
    for r in relation_ids {
        a = a.ewise_add(&graph.relation_matrix_pattern(r));
    }

    if let Some(labels) = opts.labels {
        if !labels.is_empty() {
            let mut l = BoolMatrix::new(dim);
            for label in labels {
                l = l.ewise_add(&graph.label_matrix_pattern(*label));
            }
            a = mask_rows_and_cols(&a, &l);
        }
    }

    if opts.exclude_self_loops {
        a = a.select(SelectPredicate::OffDiagonal);
    }

    a
}

/// `L·A·L` restricted to a diagonal label matrix is equivalent to keeping
/// only entries `(i, j)` where both `i` and `j` carry the label — no need
/// to go through a full sparse matrix-matrix multiply for a diagonal mask.
fn mask_rows_and_cols(a: &BoolMatrix, l_diag: &BoolMatrix) -> BoolMatrix {
    let dim = a.dim();
    let mut out = BoolMatrix::new(dim);
    for (i, j) in a.iter() {
        if l_diag.get(i, i) && l_diag.get(j, j) {
            out.set(i, j);
        }
    }
    out
}

fn neighbor_list(adjacency: &BoolMatrix) -> HashMap<u32, Vec<u32>> {
    let mut adj: HashMap<u32, Vec<u32>> = HashMap::new();
    for (i, j) in adjacency.iter() {
        adj.entry(i).or_default().push(j);
    }
    adj
}

/// Builds a `petgraph` directed graph over every live node from the
/// effective adjacency's pattern, for adapters that want `petgraph`'s
/// traversal traits rather than the raw matrix.
fn to_digraph(graph: &Graph, adjacency: &BoolMatrix) -> DiGraphMap<u32, ()> {
    let mut dg = DiGraphMap::new();
    for id in graph.live_node_ids() {
        dg.add_node(id.index() as u32);
    }
    for (i, j) in adjacency.iter() {
        dg.add_edge(i, j, ());
    }
    dg
}

/// Options for [`bfs_tree`] (§4.8).
#[derive(Debug, Clone, Default)]
pub struct BfsTreeOptions<'a> {
    /// `None` traverses every relation type.
    pub relations: Option<&'a [RelationId]>,
    /// `None` (or the original's `0`) means unlimited depth.
    pub max_level: Option<u64>,
}

/// A BFS tree rooted at the source node: the level (hop distance) and
/// parent of every node the source reached. The source itself is excluded
/// (its level would be `0`, and the original filters those out — see
/// `proc_bfs_tree.c`'s `GxB_Vector_select(..., GxB_NONZERO, ...)`).
#[derive(Debug, Clone, Default)]
pub struct BfsResult {
    pub level: HashMap<NodeId, u64>,
    pub parent: HashMap<NodeId, NodeId>,
}

/// **BfsTree** (§4.8): builds the effective adjacency for the requested
/// relations (self-loops are harmless for BFS so they are left in) as a
/// `petgraph::graphmap::DiGraphMap`, then does a level-order traversal
/// with `IntoNeighbors`. `petgraph::visit::Bfs` walks the graph but
/// exposes neither levels nor parents, so those are tracked alongside the
/// traversal with an explicit queue, mirroring `LAGraph_bfs_both`'s
/// parent-vector-plus-level-vector contract.
pub fn bfs_tree(graph: &Graph, source: NodeId, opts: &BfsTreeOptions<'_>) -> Result<BfsResult> {
    graph.get_node(source)?;

    let adjacency = effective_adjacency(
        graph,
        &AdjacencyOptions {
            relations: opts.relations,
            labels: None,
            exclude_self_loops: false,
        },
    );
    let dg = to_digraph(graph, &adjacency);
    let max_level = opts.max_level.unwrap_or(u64::MAX);

    let mut result = BfsResult::default();
    let mut queue: VecDeque<(u32, u64)> = VecDeque::new();
    let source_idx = source.index() as u32;
    queue.push_back((source_idx, 0));
    let mut visited: std::collections::HashSet<u32> = std::collections::HashSet::new();
    visited.insert(source_idx);

    while let Some((u, level)) = queue.pop_front() {
        if level >= max_level {
            continue;
        }
        for v in dg.neighbors(u) {
            if !visited.insert(v) {
                continue;
            }
            let next_level = level + 1;
            result.level.insert(NodeId(v as u64), next_level);
            result.parent.insert(NodeId(v as u64), NodeId(u as u64));
            queue.push_back((v, next_level));
        }
    }

    Ok(result)
}

/// Options for [`label_propagation`] (§4.8).
#[derive(Debug, Clone, Default)]
pub struct LabelPropagationOptions<'a> {
    pub relations: Option<&'a [RelationId]>,
    pub labels: Option<&'a [LabelId]>,
    /// `0` defaults to `10`, matching `proc_cdlp.c`'s
    /// `if (max_iters == 0) max_iters = 10;`.
    pub max_iterations: usize,
}

/// **CDLP / community-by-label-propagation** (§4.8): synchronous majority-
/// vote label propagation over the effective adjacency treated as
/// undirected (communities are not directionally scoped), excluding
/// self-loops. Every live node starts in its own community; ties break on
/// the smallest candidate community id for determinism. Stops early once a
/// full synchronous pass changes no node's label.
pub fn label_propagation(graph: &Graph, opts: &LabelPropagationOptions<'_>) -> HashMap<NodeId, u64> {
    let adjacency = effective_adjacency(
        graph,
        &AdjacencyOptions {
            relations: opts.relations,
            labels: opts.labels,
            exclude_self_loops: true,
        },
    );
    let undirected = adjacency.ewise_add(&adjacency.transpose());
    let adj = neighbor_list(&undirected);

    let max_iterations = if opts.max_iterations == 0 { 10 } else { opts.max_iterations };

    let mut community: HashMap<u32, u64> = graph
        .live_node_ids()
        .into_iter()
        .map(|id| (id.index() as u32, id.0))
        .collect();

    for _ in 0..max_iterations {
        let mut changed = false;
        let mut next = community.clone();
        let mut nodes: Vec<u32> = community.keys().copied().collect();
        nodes.sort_unstable();
        for u in nodes {
            let Some(neighbors) = adj.get(&u) else { continue };
            if neighbors.is_empty() {
                continue;
            }
            let mut votes: HashMap<u64, usize> = HashMap::new();
            for v in neighbors {
                if let Some(label) = community.get(v) {
                    *votes.entry(*label).or_insert(0) += 1;
                }
            }
            if votes.is_empty() {
                continue;
            }
            let max_count = votes.values().copied().max().unwrap();
            let winner = votes
                .iter()
                .filter(|(_, &count)| count == max_count)
                .map(|(label, _)| *label)
                .min()
                .unwrap();
            if next[&u] != winner {
                next.insert(u, winner);
                changed = true;
            }
        }
        community = next;
        if !changed {
            break;
        }
    }

    community.into_iter().map(|(id, label)| (NodeId(id as u64), label)).collect()
}

/// Validates a relation id list against the graph's schema before handing
/// it to an adapter, so a caller gets a clean error instead of a silently
/// empty effective adjacency. Not required by any adapter above (they
/// treat an unrecognized relation as "matches nothing"), but exposed for
/// callers that want strict validation up front.
pub fn validate_relations(graph: &Graph, relations: &[RelationId]) -> Result<()> {
    let known = graph.all_relation_ids();
    for r in relations {
        if !known.contains(r) {
            return Err(Error::InvalidId { kind: "relation", id: r.0 as u64 });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::model::PropertyMap;

    fn star_graph() -> (Graph, Vec<NodeId>) {
        // 0 -> 1 -> 2 -> 3, plus 0 -> 2 directly, all relation "R".
        let g = Graph::new("algos", EngineConfig::default());
        let r = g.get_or_add_relation("R");
        let nodes: Vec<NodeId> = (0..4).map(|_| g.create_node(vec![], PropertyMap::new())).collect();
        for (s, d) in [(0, 1), (1, 2), (2, 3), (0, 2)] {
            g.create_edge(nodes[s], nodes[d], r, PropertyMap::new()).unwrap();
        }
        (g, nodes)
    }

    #[test]
    fn bfs_tree_excludes_the_source_and_assigns_shortest_levels() {
        let (g, nodes) = star_graph();
        let result = bfs_tree(&g, nodes[0], &BfsTreeOptions::default()).unwrap();

        assert!(!result.level.contains_key(&nodes[0]));
        assert_eq!(result.level[&nodes[1]], 1);
        assert_eq!(result.level[&nodes[2]], 1, "0->2 is a direct edge, shorter than via 1");
        assert_eq!(result.level[&nodes[3]], 2);
        assert_eq!(result.parent[&nodes[2]], nodes[0]);
        assert_eq!(result.parent[&nodes[3]], nodes[2]);
    }

    #[test]
    fn bfs_tree_honors_max_level() {
        let (g, nodes) = star_graph();
        let opts = BfsTreeOptions { relations: None, max_level: Some(1) };
        let result = bfs_tree(&g, nodes[0], &opts).unwrap();
        assert!(result.level.contains_key(&nodes[1]));
        assert!(result.level.contains_key(&nodes[2]));
        assert!(!result.level.contains_key(&nodes[3]));
    }

    #[test]
    fn bfs_tree_rejects_a_deleted_source() {
        let (g, nodes) = star_graph();
        g.bulk_delete(&[nodes[0]], &[]);
        let err = bfs_tree(&g, nodes[0], &BfsTreeOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidId { kind: "node", .. }));
    }

    #[test]
    fn label_propagation_merges_a_tightly_connected_pair() {
        let g = Graph::new("algos", EngineConfig::default());
        let r = g.get_or_add_relation("R");
        let nodes: Vec<NodeId> = (0..4).map(|_| g.create_node(vec![], PropertyMap::new())).collect();
        // 0<->1 densely connected, 2<->3 densely connected, no edges across.
        for (s, d) in [(0, 1), (1, 0), (2, 3), (3, 2)] {
            g.create_edge(nodes[s], nodes[d], r, PropertyMap::new()).unwrap();
        }
        let opts = LabelPropagationOptions { relations: None, labels: None, max_iterations: 0 };
        let communities = label_propagation(&g, &opts);

        assert_eq!(communities[&nodes[0]], communities[&nodes[1]]);
        assert_eq!(communities[&nodes[2]], communities[&nodes[3]]);
        assert_ne!(communities[&nodes[0]], communities[&nodes[2]]);
    }

    #[test]
    fn label_propagation_leaves_isolated_nodes_in_their_own_community() {
        let g = Graph::new("algos", EngineConfig::default());
        let node = g.create_node(vec![], PropertyMap::new());
        let opts = LabelPropagationOptions::default();
        let communities = label_propagation(&g, &opts);
        assert_eq!(communities[&node], node.0);
    }

    #[test]
    fn validate_relations_flags_an_unknown_relation() {
        let (g, _nodes) = star_graph();
        let bogus = RelationId(999);
        let err = validate_relations(&g, &[bogus]).unwrap_err();
        assert!(matches!(err, Error::InvalidId { kind: "relation", .. }));
    }
}
