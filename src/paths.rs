//! # All-paths engine (C7, §4.7)
//!
//! Enumerates paths from a source node, optionally constrained to a
//! destination, over a selected relation/direction and a length bound
//! `[min, max]`. No path repeats an edge within itself; node repetition is
//! allowed, so cycles may appear (§4.7). When a destination is given, a
//! branch may only discover a brand-new node by its shortest hop from the
//! source; once it has discovered one by a longer route instead, it may
//! no longer discover further new nodes, only close back through nodes
//! already on the path (`tests/unit/test_all_paths.cpp`'s
//! `DestinationSpecificPaths`).
//!
//! Modeled as an explicit-stack iterator per §9's redesign note ("the
//! source pushes and pops stack frames manually... model as an iterator
//! with explicit `State { stack: Vec<Frame>, visited: SmallBitSet<EdgeId>
//! }`; `next()` advances one emission") rather than the retrieved
//! original's manual push/pop coroutine
//! (`examples/original_source/src/algorithms/all_paths.c`,
//! `tests/unit/test_all_paths.cpp`).

use std::collections::{HashMap, VecDeque};

use fixedbitset::FixedBitSet;

use crate::error::Result;
use crate::graph::Graph;
use crate::model::{Direction, Edge, EdgeId, Node, NodeId, Path, RelationId};

/// Value for `max` meaning "no upper bound" (§4.7: `max = ∞`).
pub const UNBOUNDED: usize = usize::MAX;

struct Frame {
    candidates: Vec<Edge>,
    cursor: usize,
    /// Whether some earlier step on this branch already discovered a node
    /// by a non-shortest hop (see `shortest_dist` below).
    violated: bool,
}

/// Hop distance from `source` to every node it reaches, ignoring edge
/// direction ties and node repetition — a plain BFS over the same
/// direction/relation filter the traversal itself uses.
fn shortest_distances(
    graph: &Graph,
    source: NodeId,
    direction: Direction,
    relations: Option<&[RelationId]>,
) -> HashMap<NodeId, usize> {
    let mut dist = HashMap::new();
    dist.insert(source, 0usize);
    let mut queue = VecDeque::new();
    queue.push_back(source);
    while let Some(u) = queue.pop_front() {
        let d = dist[&u];
        for edge in graph.get_node_edges(u, direction, relations) {
            let Some(v) = edge.other_node(u) else { continue };
            if dist.contains_key(&v) {
                continue;
            }
            dist.insert(v, d + 1);
            queue.push_back(v);
        }
    }
    dist
}

fn mark(bits: &mut FixedBitSet, id: EdgeId) {
    let i = id.0 as usize;
    if i >= bits.len() {
        bits.grow(i + 1);
    }
    bits.insert(i);
}

fn unmark(bits: &mut FixedBitSet, id: EdgeId) {
    let i = id.0 as usize;
    if i < bits.len() {
        bits.set(i, false);
    }
}

fn marked(bits: &FixedBitSet, id: EdgeId) -> bool {
    let i = id.0 as usize;
    i < bits.len() && bits[i]
}

/// Depth-first iterator over simple-w.r.t.-edges paths from one source
/// node. Does not hold the writer lock across calls to `next` — callers
/// must hold the graph's read lock for the iterator's lifetime or accept
/// that concurrent writes are forbidden (§4.7).
pub struct AllPaths<'g> {
    graph: &'g Graph,
    dest: Option<NodeId>,
    relations: Option<Vec<RelationId>>,
    direction: Direction,
    min: usize,
    max: usize,
    stack: Vec<Frame>,
    path_nodes: Vec<Node>,
    path_edges: Vec<Edge>,
    used_edges: FixedBitSet,
    root_pending: bool,
    done: bool,
    /// `Some` only when a destination is set: shortest hop count from
    /// `source` to every node it reaches, used to tell a node's one
    /// canonical shortest arrival from a longer, redundant one.
    shortest_dist: Option<HashMap<NodeId, usize>>,
}

impl<'g> AllPaths<'g> {
    /// **Init** (§4.7): fails `InvalidId` if `source` is not a live node.
    /// `relations = None` means "all relation types"; `max = UNBOUNDED`
    /// means no upper length bound.
    pub fn init(
        graph: &'g Graph,
        source: NodeId,
        dest: Option<NodeId>,
        relations: Option<Vec<RelationId>>,
        direction: Direction,
        min: usize,
        max: usize,
    ) -> Result<Self> {
        let source_node = graph.get_node(source)?;
        let root_pending = min == 0 && dest.map_or(true, |d| d == source);
        let shortest_dist = dest.map(|_| shortest_distances(graph, source, direction, relations.as_deref()));
        let first_frame = Frame {
            candidates: graph.get_node_edges(source, direction, relations.as_deref()),
            cursor: 0,
            violated: false,
        };
        Ok(Self {
            graph,
            dest,
            relations,
            direction,
            min,
            max,
            stack: vec![first_frame],
            path_nodes: vec![source_node],
            path_edges: Vec::new(),
            used_edges: FixedBitSet::with_capacity(0),
            root_pending,
            done: false,
            shortest_dist,
        })
    }

    fn snapshot(&self) -> Path {
        Path {
            nodes: self.path_nodes.clone(),
            edges: self.path_edges.clone(),
        }
    }

    /// **Next** (§4.7): advances the DFS by one emission, or `None` when
    /// exhausted ("done").
    pub fn next_path(&mut self) -> Option<Path> {
        self.next()
    }
}

impl<'g> Iterator for AllPaths<'g> {
    type Item = Path;

    fn next(&mut self) -> Option<Path> {
        if self.done {
            return None;
        }
        if self.root_pending {
            self.root_pending = false;
            return Some(self.snapshot());
        }
        loop {
            let depth = self.path_edges.len();
            if self.stack.is_empty() {
                self.done = true;
                return None;
            }
            let exhausted = {
                let frame = self.stack.last().expect("checked non-empty above");
                depth >= self.max || frame.cursor >= frame.candidates.len()
            };
            if exhausted {
                self.stack.pop();
                self.path_nodes.pop();
                if let Some(edge) = self.path_edges.pop() {
                    unmark(&mut self.used_edges, edge.id);
                }
                if self.stack.is_empty() {
                    self.done = true;
                    return None;
                }
                continue;
            }

            let frame = self.stack.last_mut().expect("checked non-empty above");
            let edge = frame.candidates[frame.cursor].clone();
            frame.cursor += 1;
            if marked(&self.used_edges, edge.id) {
                continue;
            }
            let current = self.path_nodes.last().expect("path always has a node").id;
            let Some(next_id) = edge.other_node(current) else {
                continue;
            };
            let Ok(next_node) = self.graph.get_node(next_id) else {
                continue;
            };

            let already_in_path = self.path_nodes.iter().any(|n| n.id == next_id);
            let parent_violated = self.stack.last().expect("checked non-empty above").violated;
            // When a destination is set, a node may be freshly discovered
            // only by its shortest hop from the source; once a branch has
            // discovered one by a longer route, it may no longer discover
            // further new nodes at all — it can only keep closing back
            // through nodes already on the path. Revisits are exempt from
            // this (§8 S5: matches `DestinationSpecificPaths`).
            let child_violated = match &self.shortest_dist {
                Some(_) if !already_in_path => {
                    if parent_violated {
                        continue;
                    }
                    let dist = self.shortest_dist.as_ref().expect("checked Some above");
                    let optimal = dist.get(&next_id).copied() == dist.get(&current).map(|d| d + 1);
                    !optimal
                }
                _ => parent_violated,
            };

            mark(&mut self.used_edges, edge.id);
            self.path_edges.push(edge);
            self.path_nodes.push(next_node);
            let new_depth = self.path_edges.len();
            let reached_dest = new_depth > 0 && self.dest == Some(next_id);
            // Once a path reaches the requested destination it is a
            // complete answer; we don't keep extending past it in search
            // of longer paths that loop back through the same
            // destination (§4.7: "only paths whose last node equals the
            // destination are returned" is read as the destination being
            // a terminal, not a waypoint).
            let candidates = if reached_dest {
                Vec::new()
            } else {
                self.graph.get_node_edges(next_id, self.direction, self.relations.as_deref())
            };
            self.stack.push(Frame {
                candidates,
                cursor: 0,
                violated: child_violated,
            });

            if new_depth >= self.min && self.dest.map_or(true, |d| d == next_id) {
                return Some(self.snapshot());
            }
        }
    }
}
