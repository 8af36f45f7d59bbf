//! # Schema registry (C3, §4.3)
//!
//! Owns the injective `name ↔ id` maps for labels and relation types, and
//! the per-label / per-relation matrices allocated when a name is first
//! registered. Ids never recycle.

use crate::matrix::{BoolMatrix, CellMatrix};
use crate::model::{LabelId, RelationId};
use indexmap::IndexMap;

pub struct SchemaRegistry {
    labels: IndexMap<String, LabelId>,
    label_matrices: Vec<BoolMatrix>,
    relations: IndexMap<String, RelationId>,
    relation_matrices: Vec<CellMatrix>,
    relation_matrices_t: Vec<Option<CellMatrix>>,
    maintain_transposed: bool,
}

impl SchemaRegistry {
    pub fn new(maintain_transposed: bool) -> Self {
        Self {
            labels: IndexMap::new(),
            label_matrices: Vec::new(),
            relations: IndexMap::new(),
            relation_matrices: Vec::new(),
            relation_matrices_t: Vec::new(),
            maintain_transposed,
        }
    }

    pub fn maintain_transposed(&self) -> bool {
        self.maintain_transposed
    }

    /// Returns the id for `name`, allocating a new diagonal boolean
    /// matrix dimensioned to `node_capacity` if this is the first mention.
    pub fn get_or_add_label(&mut self, name: &str, node_capacity: usize) -> LabelId {
        if let Some(&id) = self.labels.get(name) {
            return id;
        }
        let id = LabelId(self.labels.len() as u32);
        self.labels.insert(name.to_string(), id);
        self.label_matrices.push(BoolMatrix::new(node_capacity));
        id
    }

    /// Returns the id for `name`, allocating `R_t` (and `R_tᵀ` if
    /// transpose maintenance is configured) if this is the first mention.
    pub fn get_or_add_relation(&mut self, name: &str, node_capacity: usize) -> RelationId {
        if let Some(&id) = self.relations.get(name) {
            return id;
        }
        let id = RelationId(self.relations.len() as u32);
        self.relations.insert(name.to_string(), id);
        self.relation_matrices.push(CellMatrix::new(node_capacity));
        self.relation_matrices_t.push(if self.maintain_transposed {
            Some(CellMatrix::new(node_capacity))
        } else {
            None
        });
        id
    }

    pub fn get_label(&self, name: &str) -> Option<LabelId> {
        self.labels.get(name).copied()
    }

    pub fn get_relation(&self, name: &str) -> Option<RelationId> {
        self.relations.get(name).copied()
    }

    pub fn label_name(&self, id: LabelId) -> Option<&str> {
        self.labels.get_index(id.0 as usize).map(|(name, _)| name.as_str())
    }

    pub fn relation_name(&self, id: RelationId) -> Option<&str> {
        self.relations.get_index(id.0 as usize).map(|(name, _)| name.as_str())
    }

    /// Stable ordering by id (§4.3 `ListLabels`).
    pub fn list_labels(&self) -> impl Iterator<Item = (LabelId, &str)> {
        self.labels.iter().map(|(name, &id)| (id, name.as_str()))
    }

    /// Stable ordering by id (§4.3 `ListRelations`).
    pub fn list_relations(&self) -> impl Iterator<Item = (RelationId, &str)> {
        self.relations.iter().map(|(name, &id)| (id, name.as_str()))
    }

    pub fn label_matrix(&self, id: LabelId) -> &BoolMatrix {
        &self.label_matrices[id.0 as usize]
    }

    pub fn label_matrix_mut(&mut self, id: LabelId) -> &mut BoolMatrix {
        &mut self.label_matrices[id.0 as usize]
    }

    pub fn label_matrices(&self) -> impl Iterator<Item = (LabelId, &BoolMatrix)> {
        self.label_matrices
            .iter()
            .enumerate()
            .map(|(i, m)| (LabelId(i as u32), m))
    }

    pub fn relation_matrix(&self, id: RelationId) -> &CellMatrix {
        &self.relation_matrices[id.0 as usize]
    }

    pub fn relation_matrix_mut(&mut self, id: RelationId) -> &mut CellMatrix {
        &mut self.relation_matrices[id.0 as usize]
    }

    pub fn relation_matrices(&self) -> impl Iterator<Item = (RelationId, &CellMatrix)> {
        self.relation_matrices
            .iter()
            .enumerate()
            .map(|(i, m)| (RelationId(i as u32), m))
    }

    pub fn relation_matrix_t(&self, id: RelationId) -> Option<&CellMatrix> {
        self.relation_matrices_t[id.0 as usize].as_ref()
    }

    pub fn relation_matrix_t_mut(&mut self, id: RelationId) -> Option<&mut CellMatrix> {
        self.relation_matrices_t[id.0 as usize].as_mut()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    /// Resize every label and relation matrix to `dim` (§4.4 step 3:
    /// matrices are resized before node id issuance).
    pub fn resize_all(&mut self, dim: usize) {
        for m in &mut self.label_matrices {
            m.resize(dim);
        }
        for m in &mut self.relation_matrices {
            m.resize(dim);
        }
        for m in self.relation_matrices_t.iter_mut().flatten() {
            m.resize(dim);
        }
    }
}
