//! # Graph core (C4, §4.4)
//!
//! Holds the node store, edge store, adjacency matrix, schema registry,
//! and the reader/writer coordinator that gates every mutation. This is
//! the component every other module (paths, algorithms, persistence)
//! reads through.

use std::collections::HashSet;

use smallvec::SmallVec;
use tracing::instrument;

use crate::config::EngineConfig;
use crate::entity_store::DataBlock;
use crate::error::{Error, Result};
use crate::lock::RwCoordinator;
use crate::matrix::{BoolMatrix, Cell, CellMatrix};
use crate::model::{Direction, Edge, EdgeId, LabelId, Node, NodeId, PropertyMap, RelationId};
use crate::schema::SchemaRegistry;

/// Matrix dimensions grow in steps of this size (§4.2: "page granularity
/// chosen by caller, e.g. 16,384").
const CAPACITY_STEP: usize = 16_384;

fn next_capacity(required: usize) -> usize {
    if required == 0 {
        return 0;
    }
    ((required + CAPACITY_STEP - 1) / CAPACITY_STEP) * CAPACITY_STEP
}

struct GraphInner {
    nodes: DataBlock<Node>,
    edges: DataBlock<Edge>,
    adjacency: BoolMatrix,
    schema: SchemaRegistry,
    matrix_dim: usize,
}

impl GraphInner {
    fn new(config: &EngineConfig) -> Self {
        Self {
            nodes: DataBlock::new(),
            edges: DataBlock::new(),
            adjacency: BoolMatrix::new(0),
            schema: SchemaRegistry::new(config.maintain_transposed_matrices),
            matrix_dim: 0,
        }
    }

    /// Grows every matrix bound to the node store so that `required`
    /// (typically `nodes.capacity()` right after an allocation) is
    /// in-range. Matrices never shrink (I1).
    fn ensure_capacity(&mut self, required: usize) {
        if required <= self.matrix_dim {
            return;
        }
        let dim = next_capacity(required);
        self.adjacency.resize(dim);
        self.schema.resize_all(dim);
        self.matrix_dim = dim;
    }
}

/// One named, in-memory property graph.
pub struct Graph {
    name: parking_lot::Mutex<String>,
    inner: RwCoordinator<GraphInner>,
    config: EngineConfig,
}

impl Graph {
    pub fn new(name: impl Into<String>, config: EngineConfig) -> Self {
        Self {
            name: parking_lot::Mutex::new(name.into()),
            inner: RwCoordinator::new(GraphInner::new(&config)),
            config,
        }
    }

    pub fn name(&self) -> String {
        self.name.lock().clone()
    }

    /// Keeps the graph's internal name in sync with a host rename event
    /// (§C.1 — mirrors `_RenameGraphHandler`).
    pub fn on_rename(&self, new_name: impl Into<String>) {
        *self.name.lock() = new_name.into();
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.count()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.read().edges.count()
    }

    pub fn deleted_node_count(&self) -> usize {
        self.inner.read().nodes.deleted_count()
    }

    pub fn deleted_edge_count(&self) -> usize {
        self.inner.read().edges.deleted_count()
    }

    pub fn get_or_add_label(&self, name: &str) -> LabelId {
        let mut inner = self.inner.write();
        let capacity = inner.nodes.capacity();
        inner.schema.get_or_add_label(name, capacity)
    }

    pub fn get_or_add_relation(&self, name: &str) -> RelationId {
        let mut inner = self.inner.write();
        let capacity = inner.nodes.capacity();
        inner.schema.get_or_add_relation(name, capacity)
    }

    pub fn get_label(&self, name: &str) -> Option<LabelId> {
        self.inner.read().schema.get_label(name)
    }

    pub fn get_relation(&self, name: &str) -> Option<RelationId> {
        self.inner.read().schema.get_relation(name)
    }

    /// **CreateNode** (§4.4): allocate, grow matrices if the new id
    /// crosses the current dimension, then set one `L_k[id,id]` per
    /// label.
    #[instrument(skip(self, labels, properties))]
    pub fn create_node(
        &self,
        labels: impl IntoIterator<Item = LabelId>,
        properties: PropertyMap,
    ) -> NodeId {
        let mut inner = self.inner.write();
        let placeholder = Node::new(NodeId(0));
        let raw_id = inner.nodes.allocate(placeholder);
        inner.ensure_capacity(inner.nodes.capacity());

        let id = NodeId(raw_id);
        let labels: Vec<LabelId> = labels.into_iter().collect();
        for &label in &labels {
            inner.schema.label_matrix_mut(label).set(raw_id as u32, raw_id as u32);
        }
        let node = inner.nodes.get_mut(raw_id).expect("just allocated");
        node.id = id;
        node.labels = labels;
        node.properties = properties;
        id
    }

    pub fn get_node(&self, id: NodeId) -> Result<Node> {
        self.inner
            .read()
            .nodes
            .get(id.0)
            .cloned()
            .ok_or(Error::InvalidId { kind: "node", id: id.0 })
    }

    pub fn get_edge(&self, id: EdgeId) -> Result<Edge> {
        self.inner
            .read()
            .edges
            .get(id.0)
            .cloned()
            .ok_or(Error::InvalidId { kind: "edge", id: id.0 })
    }

    /// **CreateEdge** (§4.4): validates endpoints, allocates the edge,
    /// runs the relation-cell state machine (empty → single → multi),
    /// sets `A[src,dst]`, and mirrors into `R_tᵀ` when maintained.
    #[instrument(skip(self, properties))]
    pub fn create_edge(
        &self,
        src: NodeId,
        dst: NodeId,
        relation: RelationId,
        properties: PropertyMap,
    ) -> Result<EdgeId> {
        let mut inner = self.inner.write();
        if inner.nodes.get(src.0).is_none() {
            return Err(Error::InvalidId { kind: "node", id: src.0 });
        }
        if inner.nodes.get(dst.0).is_none() {
            return Err(Error::InvalidId { kind: "node", id: dst.0 });
        }

        let placeholder = Edge::new(EdgeId(0), src, dst, relation);
        let raw_id = inner.edges.allocate(placeholder);
        let id = EdgeId(raw_id);
        {
            let edge = inner.edges.get_mut(raw_id).expect("just allocated");
            edge.id = id;
            edge.properties = properties;
        }

        let (s, d) = (src.index() as u32, dst.index() as u32);
        insert_into_cell(inner.schema.relation_matrix_mut(relation), s, d, id);
        if inner.schema.maintain_transposed() {
            if let Some(t) = inner.schema.relation_matrix_t_mut(relation) {
                insert_into_cell(t, d, s, id);
            }
        }
        inner.adjacency.set(s, d);
        Ok(id)
    }

    /// **GetEdgesConnecting** (§4.4). `direction` is relative to the
    /// `(src, dst)` pair as given: `Out` reads `R_t[src,dst]`, `In` reads
    /// `R_t[dst,src]`, `Both` is their union.
    pub fn get_edges_connecting(
        &self,
        src: NodeId,
        dst: NodeId,
        relation_filter: Option<&[RelationId]>,
        direction: Direction,
    ) -> Vec<Edge> {
        let inner = self.inner.read();
        let (s, d) = (src.index() as u32, dst.index() as u32);
        let relations: Vec<RelationId> = match relation_filter {
            Some(rs) => rs.to_vec(),
            None => inner.schema.list_relations().map(|(id, _)| id).collect(),
        };

        let mut ids: Vec<EdgeId> = Vec::new();
        for relation in relations {
            let matrix = inner.schema.relation_matrix(relation);
            match direction {
                Direction::Out => ids.extend(matrix.edge_ids_at(s, d)),
                Direction::In => ids.extend(matrix.edge_ids_at(d, s)),
                Direction::Both => {
                    ids.extend(matrix.edge_ids_at(s, d));
                    ids.extend(matrix.edge_ids_at(d, s));
                }
            }
        }
        ids.sort_by_key(|id| id.0);
        ids.dedup();
        ids.into_iter().filter_map(|id| inner.edges.get(id.0).cloned()).collect()
    }

    /// **GetNodeEdges** (§4.4). `Out` iterates row `node` of each `R_t`;
    /// `In` iterates row `node` of `R_tᵀ` when maintained, else falls
    /// back to scanning `R_t` for a matching column; `Both` unions the
    /// two without double-reporting self-loops.
    pub fn get_node_edges(
        &self,
        node: NodeId,
        direction: Direction,
        relation_filter: Option<&[RelationId]>,
    ) -> Vec<Edge> {
        let inner = self.inner.read();
        let n = node.index() as u32;
        let relations: Vec<RelationId> = match relation_filter {
            Some(rs) => rs.to_vec(),
            None => inner.schema.list_relations().map(|(id, _)| id).collect(),
        };

        let mut ids: HashSet<EdgeId> = HashSet::new();
        for relation in relations {
            if matches!(direction, Direction::Out | Direction::Both) {
                let matrix = inner.schema.relation_matrix(relation);
                for (_, cell) in matrix.row(n) {
                    ids.extend(cell_edge_ids(cell));
                }
            }
            if matches!(direction, Direction::In | Direction::Both) {
                if inner.schema.maintain_transposed() {
                    if let Some(t) = inner.schema.relation_matrix_t(relation) {
                        for (_, cell) in t.row(n) {
                            ids.extend(cell_edge_ids(cell));
                        }
                    }
                } else {
                    let matrix = inner.schema.relation_matrix(relation);
                    for (_, j, cell) in matrix.iter() {
                        if j == n {
                            ids.extend(cell_edge_ids(cell));
                        }
                    }
                }
            }
        }
        let mut ids: Vec<EdgeId> = ids.into_iter().collect();
        ids.sort_by_key(|id| id.0);
        ids.into_iter().filter_map(|id| inner.edges.get(id.0).cloned()).collect()
    }

    /// **DeleteEdge** (§4.4): runs the relation-cell state machine in
    /// reverse, mirrors the transpose, clears `A[s,d]` if no relation
    /// remains between the pair, then frees the edge slot.
    #[instrument(skip(self))]
    pub fn delete_edge(&self, edge: EdgeId) -> Result<()> {
        let mut inner = self.inner.write();
        let (src, dst, relation) = {
            let e = inner
                .edges
                .get(edge.0)
                .ok_or(Error::InvalidId { kind: "edge", id: edge.0 })?;
            (e.src, e.dst, e.relation)
        };
        Self::unlink_edge(&mut inner, src, dst, relation, edge);
        inner.edges.delete(edge.0);
        Ok(())
    }

    fn unlink_edge(inner: &mut GraphInner, src: NodeId, dst: NodeId, relation: RelationId, edge: EdgeId) {
        let (s, d) = (src.index() as u32, dst.index() as u32);
        remove_from_cell(inner.schema.relation_matrix_mut(relation), s, d, edge);
        if inner.schema.maintain_transposed() {
            if let Some(t) = inner.schema.relation_matrix_t_mut(relation) {
                remove_from_cell(t, d, s, edge);
            }
        }
        let any_relation_remaining = inner
            .schema
            .relation_matrices()
            .any(|(_, m)| m.get(s, d).is_some());
        if !any_relation_remaining {
            inner.adjacency.clear(s, d);
        }
    }

    /// **DeleteNode** (§4.4): strict contract — the caller must have
    /// already detached every incident edge. Clears every `L_k[id,id]`
    /// the node carried and frees the slot.
    #[instrument(skip(self))]
    pub fn delete_node(&self, node: NodeId) -> Result<()> {
        let mut inner = self.inner.write();
        let labels = {
            let n = inner
                .nodes
                .get(node.0)
                .ok_or(Error::InvalidId { kind: "node", id: node.0 })?;
            n.labels.clone()
        };
        let i = node.index() as u32;
        for label in labels {
            inner.schema.label_matrix_mut(label).clear(i, i);
        }
        inner.nodes.delete(node.0);
        Ok(())
    }

    /// **BulkDelete** (§4.4): removes the given nodes, implicitly
    /// removing every edge incident on any of them, plus any edges named
    /// explicitly. Returns `(nodes_deleted, edges_deleted)`, where
    /// `edges_deleted` is the count of distinct edges actually removed —
    /// the union of the caller's edge list and the edges implicitly
    /// pulled in by node deletion.
    #[instrument(skip(self, nodes, edges))]
    pub fn bulk_delete(&self, nodes: &[NodeId], edges: &[EdgeId]) -> (usize, usize) {
        let mut inner = self.inner.write();

        let node_set: HashSet<NodeId> = nodes.iter().copied().collect();
        let mut to_delete: HashSet<EdgeId> = edges.iter().copied().collect();

        let relation_ids: Vec<RelationId> = inner.schema.list_relations().map(|(id, _)| id).collect();
        for &node in &node_set {
            if inner.nodes.get(node.0).is_none() {
                continue;
            }
            let n = node.index() as u32;
            for &relation in &relation_ids {
                let matrix = inner.schema.relation_matrix(relation);
                for (i, j, cell) in matrix.iter() {
                    if i == n || j == n {
                        to_delete.extend(cell_edge_ids(cell));
                    }
                }
            }
        }

        let edges_deleted = to_delete.len();
        for edge in &to_delete {
            if let Some(e) = inner.edges.get(edge.0) {
                let (src, dst, relation) = (e.src, e.dst, e.relation);
                Self::unlink_edge(&mut inner, src, dst, relation, *edge);
            }
        }
        for edge in &to_delete {
            inner.edges.delete(edge.0);
        }

        let mut nodes_deleted = 0;
        for &node in &node_set {
            let labels = match inner.nodes.get(node.0) {
                Some(n) => n.labels.clone(),
                None => continue,
            };
            let i = node.index() as u32;
            for label in labels {
                inner.schema.label_matrix_mut(label).clear(i, i);
            }
            inner.nodes.delete(node.0);
            nodes_deleted += 1;
        }

        (nodes_deleted, edges_deleted)
    }

    /// Reinstates a node at its original id. Used only by the
    /// persistence decoder (§4.6), which must preserve ids exactly
    /// rather than reassign dense ones.
    pub(crate) fn restore_node(&self, id: NodeId, labels: Vec<LabelId>, properties: PropertyMap) {
        let mut inner = self.inner.write();
        inner.ensure_capacity(id.index() + 1);
        let i = id.index() as u32;
        for &label in &labels {
            inner.schema.label_matrix_mut(label).set(i, i);
        }
        inner.nodes.insert_at(
            id.0,
            Node {
                id,
                labels,
                properties,
            },
        );
    }

    /// Reinstates an edge at its original id, mirroring `CreateEdge`'s
    /// matrix updates without reallocating a fresh id.
    pub(crate) fn restore_edge(
        &self,
        id: EdgeId,
        src: NodeId,
        dst: NodeId,
        relation: RelationId,
        properties: PropertyMap,
    ) {
        let mut inner = self.inner.write();
        inner.ensure_capacity(src.index().max(dst.index()) + 1);
        let (s, d) = (src.index() as u32, dst.index() as u32);
        insert_into_cell(inner.schema.relation_matrix_mut(relation), s, d, id);
        if inner.schema.maintain_transposed() {
            if let Some(t) = inner.schema.relation_matrix_t_mut(relation) {
                insert_into_cell(t, d, s, id);
            }
        }
        inner.adjacency.set(s, d);
        inner.edges.insert_at(
            id.0,
            Edge {
                id,
                src,
                dst,
                relation,
                properties,
            },
        );
    }

    /// Rebuilds the free lists of the node and edge stores after a batch
    /// of `restore_node`/`restore_edge` calls, so normal allocation
    /// resumes correctly post-decode.
    pub(crate) fn finalize_restore(&self) {
        let mut inner = self.inner.write();
        inner.nodes.rebuild_free_list();
        inner.edges.rebuild_free_list();
    }

    /// **Iterate** over the node store (§4.2): every live node, in an
    /// unspecified but total order. Used by the persistence encoder, the
    /// algorithm adapters' node enumeration, and any external caller
    /// that needs a full scan (e.g. a query engine's label-less `MATCH`).
    pub fn all_nodes(&self) -> Vec<Node> {
        self.inner.read().nodes.iter().map(|(_, n)| n.clone()).collect()
    }

    /// **Iterate** over the edge store (§4.2): every live edge, in an
    /// unspecified but total order.
    pub fn all_edges(&self) -> Vec<Edge> {
        self.inner.read().edges.iter().map(|(_, e)| e.clone()).collect()
    }

    pub(crate) fn schema_label_name(&self, id: LabelId) -> Option<String> {
        self.inner.read().schema.label_name(id).map(str::to_owned)
    }

    pub(crate) fn schema_relation_name(&self, id: RelationId) -> Option<String> {
        self.inner.read().schema.relation_name(id).map(str::to_owned)
    }

    /// Label names in id order, for the persistence codec's schema block.
    pub(crate) fn label_names_ordered(&self) -> Vec<String> {
        self.inner
            .read()
            .schema
            .list_labels()
            .map(|(_, name)| name.to_owned())
            .collect()
    }

    /// Relation names in id order, for the persistence codec's schema block.
    pub(crate) fn relation_names_ordered(&self) -> Vec<String> {
        self.inner
            .read()
            .schema
            .list_relations()
            .map(|(_, name)| name.to_owned())
            .collect()
    }

    /// Every live node id, for the algorithm adapters (C8) and path engine
    /// (C7), which need to iterate nodes without exposing node bodies.
    pub(crate) fn live_node_ids(&self) -> Vec<NodeId> {
        self.inner.read().nodes.iter().map(|(id, _)| NodeId(id)).collect()
    }

    /// Pattern of `R_t` for one relation, read-only — used by C8 to build
    /// an effective adjacency from a relation selection (§4.8).
    pub(crate) fn relation_matrix_pattern(&self, relation: RelationId) -> BoolMatrix {
        self.inner.read().schema.relation_matrix(relation).pattern()
    }

    /// Pattern of `L_k` for one label, read-only — used by C8 to build the
    /// `L·A·L` label pre/post filter (§4.8).
    pub(crate) fn label_matrix_pattern(&self, label: LabelId) -> BoolMatrix {
        self.inner.read().schema.label_matrix(label).clone()
    }

    pub(crate) fn all_relation_ids(&self) -> Vec<RelationId> {
        self.inner.read().schema.list_relations().map(|(id, _)| id).collect()
    }

    /// Current column/row dimension shared by every matrix bound to this
    /// graph (§3: "dimension matches A").
    pub(crate) fn matrix_dim(&self) -> usize {
        self.inner.read().matrix_dim
    }

    /// Fork-barrier hook (§4.5, §5): acquires the read lock so a
    /// host-initiated fork sees this graph in a quiescent, self-consistent
    /// state. The host must hold the returned guard until the fork
    /// returns, then pass it to [`Graph::post_fork_parent`].
    pub fn pre_fork(&self) -> ForkBarrier<'_> {
        ForkBarrier(self.inner.read())
    }

    /// Called by the host in the parent process right after `fork()`
    /// returns; releases the read lock taken by [`Graph::pre_fork`].
    pub fn post_fork_parent(&self, guard: ForkBarrier<'_>) {
        drop(guard);
    }
}

/// Opaque read-lock guard returned by [`Graph::pre_fork`]. Holding it keeps
/// the graph quiescent for the duration of a host fork; dropping it (via
/// [`Graph::post_fork_parent`] or simply letting it go out of scope)
/// releases the read lock.
pub struct ForkBarrier<'g>(parking_lot::RwLockReadGuard<'g, GraphInner>);

fn insert_into_cell(matrix: &mut CellMatrix, i: u32, j: u32, edge_id: EdgeId) {
    match matrix.get(i, j) {
        None => matrix.set(i, j, Cell::Single(edge_id)),
        Some(Cell::Single(existing)) => {
            let existing = *existing;
            matrix.set(i, j, Cell::Multi(SmallVec::from_slice(&[existing, edge_id])));
        }
        Some(Cell::Multi(ids)) => {
            let mut ids = ids.clone();
            ids.push(edge_id);
            matrix.set(i, j, Cell::Multi(ids));
        }
    }
}

fn remove_from_cell(matrix: &mut CellMatrix, i: u32, j: u32, edge_id: EdgeId) {
    match matrix.get(i, j) {
        Some(Cell::Single(id)) if *id == edge_id => {
            matrix.clear(i, j);
        }
        Some(Cell::Multi(ids)) => {
            let mut remaining: SmallVec<[EdgeId; 4]> =
                ids.iter().copied().filter(|&id| id != edge_id).collect();
            if remaining.len() > 1 {
                matrix.set(i, j, Cell::Multi(remaining));
            } else if let Some(last) = remaining.pop() {
                matrix.set(i, j, Cell::Single(last));
            } else {
                matrix.clear(i, j);
            }
        }
        _ => {}
    }
}

fn cell_edge_ids(cell: &Cell) -> SmallVec<[EdgeId; 4]> {
    match cell {
        Cell::Single(id) => SmallVec::from_slice(&[*id]),
        Cell::Multi(ids) => ids.clone(),
    }
}
