//! # Sparse-matrix abstraction (C1, §4.1)
//!
//! A thin, typed adaptor over a pluggable sparse-matrix kernel. Two
//! element types are supported, matching §3's matrices:
//!
//! - `Bool` — the adjacency matrix `A` and the diagonal label matrices `L_k`.
//! - `Cell` — the relation matrices `R_t` (and their transposes), whose
//!   cells pack either a single `EdgeId` or a pointer to a multi-edge
//!   list, modeled here as the `Cell` enum (§9 redesign note: "expose an
//!   `enum Cell { Empty, Single(EdgeId), Multi(ListId) }` at the
//!   Rust/engine boundary").
//!
//! Bulk linear-algebra operations (`transpose`, `mxv`) are delegated to
//! `sprs`, rebuilt on demand from the coordinate overlay that gives this
//! wrapper true O(1) `get`/`set`/`clear` (GraphBLAS gets the same
//! guarantee from its hypersparse/hash storage formats; `sprs`'s CSR does
//! not, hence the overlay). `ewise_add` and `select` operate directly on
//! the coordinate overlay since they are pattern-level operations that
//! gain nothing from a CSR round trip.

use crate::model::EdgeId;
use smallvec::SmallVec;
use sprs::{CsMat, TriMat};
use std::collections::HashMap;

/// A relation-matrix cell: empty, a single edge, or a multi-edge list.
///
/// The multi-edge list uses `SmallVec` so that the common 2-edge case
/// (the first promotion out of `Single`) never allocates on the heap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Single(EdgeId),
    Multi(SmallVec<[EdgeId; 4]>),
}

impl Cell {
    fn edge_ids(&self) -> SmallVec<[EdgeId; 4]> {
        match self {
            Cell::Single(id) => SmallVec::from_slice(&[*id]),
            Cell::Multi(ids) => ids.clone(),
        }
    }
}

/// Predicate kinds accepted by `select` (§4.1).
#[derive(Debug, Clone, Copy)]
pub enum SelectPredicate {
    OffDiagonal,
    NonZero,
}

/// A square boolean matrix: the adjacency matrix or a label matrix.
///
/// Construction is zero-valued; `resize` never destroys existing entries
/// (§4.1 `Resize`).
#[derive(Debug, Clone)]
pub struct BoolMatrix {
    dim: usize,
    entries: HashMap<(u32, u32), ()>,
}

impl BoolMatrix {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            entries: HashMap::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn resize(&mut self, dim: usize) {
        debug_assert!(dim >= self.dim, "resize must never shrink a live matrix");
        self.dim = dim;
    }

    pub fn set(&mut self, i: u32, j: u32) {
        self.entries.insert((i, j), ());
    }

    pub fn clear(&mut self, i: u32, j: u32) {
        self.entries.remove(&(i, j));
    }

    pub fn get(&self, i: u32, j: u32) -> bool {
        self.entries.contains_key(&(i, j))
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.entries.keys().copied()
    }

    /// `dst ← pattern(self) ∪ pattern(other)` (§4.1 `EWiseAdd`).
    pub fn ewise_add(&self, other: &BoolMatrix) -> BoolMatrix {
        let dim = self.dim.max(other.dim);
        let mut out = BoolMatrix::new(dim);
        out.entries = self.entries.clone();
        out.entries.extend(other.entries.iter().map(|(&k, &v)| (k, v)));
        out
    }

    /// `dst ← selfᵀ` via the sparse kernel.
    pub fn transpose(&self) -> BoolMatrix {
        let csr = self.to_csr();
        let csc_as_csr = csr.transpose_view().to_owned().to_csr();
        Self::from_csr(&csc_as_csr, self.dim)
    }

    /// Boolean-or-and matrix-vector multiply: `out[i] = OR_j (self[i,j] AND v[j])`.
    pub fn mxv(&self, v: &[bool]) -> Vec<bool> {
        debug_assert_eq!(v.len(), self.dim);
        let mat = self.to_csr();
        let in_vec: Vec<f64> = v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect();
        let mut out_vec = vec![0.0_f64; self.dim];
        sprs::prod::mul_acc_mat_vec_csr(mat.view(), &in_vec, &mut out_vec);
        out_vec.into_iter().map(|x| x > 0.0).collect()
    }

    pub fn select(&self, predicate: SelectPredicate) -> BoolMatrix {
        let mut out = BoolMatrix::new(self.dim);
        for &(i, j) in self.entries.keys() {
            let keep = match predicate {
                SelectPredicate::OffDiagonal => i != j,
                SelectPredicate::NonZero => true,
            };
            if keep {
                out.set(i, j);
            }
        }
        out
    }

    fn to_csr(&self) -> CsMat<f64> {
        let mut tri = TriMat::new((self.dim, self.dim));
        for &(i, j) in self.entries.keys() {
            tri.add_triplet(i as usize, j as usize, 1.0_f64);
        }
        tri.to_csr()
    }

    fn from_csr(mat: &CsMat<f64>, dim: usize) -> BoolMatrix {
        let mut out = BoolMatrix::new(dim);
        for (_, (i, j)) in mat.iter() {
            out.set(i as u32, j as u32);
        }
        out
    }
}

/// A square matrix of relation cells: `R_t` or its transpose `R_tᵀ`.
#[derive(Debug, Clone)]
pub struct CellMatrix {
    dim: usize,
    entries: HashMap<(u32, u32), Cell>,
}

impl CellMatrix {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            entries: HashMap::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn resize(&mut self, dim: usize) {
        debug_assert!(dim >= self.dim, "resize must never shrink a live matrix");
        self.dim = dim;
    }

    pub fn get(&self, i: u32, j: u32) -> Option<&Cell> {
        self.entries.get(&(i, j))
    }

    pub fn set(&mut self, i: u32, j: u32, cell: Cell) {
        self.entries.insert((i, j), cell);
    }

    pub fn clear(&mut self, i: u32, j: u32) {
        self.entries.remove(&(i, j));
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, &Cell)> + '_ {
        self.entries.iter().map(|(&(i, j), c)| (i, j, c))
    }

    /// Pattern (not value) of this matrix, as a `BoolMatrix` — used when
    /// folding `R_t` into the union that makes up `A` (I3) or an
    /// effective adjacency matrix (C8).
    pub fn pattern(&self) -> BoolMatrix {
        let mut out = BoolMatrix::new(self.dim);
        for &(i, j) in self.entries.keys() {
            out.set(i, j);
        }
        out
    }

    pub fn transpose(&self) -> CellMatrix {
        let mut out = CellMatrix::new(self.dim);
        for (&(i, j), cell) in self.entries.iter() {
            out.set(j, i, cell.clone());
        }
        out
    }

    /// Edge ids stored at `(i, j)`, flattened from either `Single` or
    /// `Multi` — used by `GetEdgesConnecting`/`GetNodeEdges` (§4.4).
    pub fn edge_ids_at(&self, i: u32, j: u32) -> SmallVec<[EdgeId; 4]> {
        self.entries
            .get(&(i, j))
            .map(|c| c.edge_ids())
            .unwrap_or_default()
    }

    /// Every `(i, j)` in row `i`, in an unspecified but total order
    /// (§4.1 `Iterate`).
    pub fn row(&self, i: u32) -> impl Iterator<Item = (u32, &Cell)> + '_ {
        self.entries
            .iter()
            .filter(move |&(&(r, _), _)| r == i)
            .map(|(&(_, c), cell)| (c, cell))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_matrix_set_get_clear() {
        let mut m = BoolMatrix::new(4);
        assert!(!m.get(1, 2));
        m.set(1, 2);
        assert!(m.get(1, 2));
        assert_eq!(m.nnz(), 1);
        m.clear(1, 2);
        assert!(!m.get(1, 2));
        assert_eq!(m.nnz(), 0);
    }

    #[test]
    fn bool_matrix_resize_preserves_entries() {
        let mut m = BoolMatrix::new(2);
        m.set(0, 1);
        m.resize(10);
        assert_eq!(m.dim(), 10);
        assert!(m.get(0, 1));
    }

    #[test]
    fn bool_matrix_ewise_add_is_union() {
        let mut a = BoolMatrix::new(4);
        a.set(0, 1);
        let mut b = BoolMatrix::new(4);
        b.set(1, 2);
        let c = a.ewise_add(&b);
        assert!(c.get(0, 1));
        assert!(c.get(1, 2));
        assert_eq!(c.nnz(), 2);
    }

    #[test]
    fn bool_matrix_transpose() {
        let mut a = BoolMatrix::new(4);
        a.set(0, 3);
        let t = a.transpose();
        assert!(t.get(3, 0));
        assert!(!t.get(0, 3));
    }

    #[test]
    fn cell_matrix_promotion_round_trip() {
        let mut m = CellMatrix::new(4);
        m.set(0, 1, Cell::Single(EdgeId(10)));
        assert_eq!(m.edge_ids_at(0, 1).as_slice(), &[EdgeId(10)]);

        m.set(0, 1, Cell::Multi(SmallVec::from_slice(&[EdgeId(10), EdgeId(11)])));
        let ids = m.edge_ids_at(0, 1);
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn cell_matrix_pattern_matches_nonzero_cells() {
        let mut m = CellMatrix::new(4);
        m.set(0, 1, Cell::Single(EdgeId(1)));
        let pattern = m.pattern();
        assert!(pattern.get(0, 1));
        assert_eq!(pattern.nnz(), 1);
    }

    #[test]
    fn cell_matrix_transpose_mirrors_tagging() {
        let mut m = CellMatrix::new(4);
        m.set(0, 1, Cell::Single(EdgeId(1)));
        let t = m.transpose();
        assert_eq!(t.get(1, 0), Some(&Cell::Single(EdgeId(1))));
    }
}
