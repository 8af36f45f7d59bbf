//! Engine configuration (§6), read once at `Engine::new`.
//!
//! Mirrors `RG_Config` in the retrieved original source
//! (`examples/original_source/src/config.h`) field for field. Parsing
//! these from CLI/module arguments is explicitly out of scope (§1); the
//! struct itself and the behaviors it gates are this module's job.

/// `vkey_entity_count` value meaning "encode the whole graph in one shard".
pub const VKEY_ENTITY_COUNT_UNLIMITED: u64 = u64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Thread count for the host's worker thread pool. Not used by the
    /// core itself (no cooperative scheduler, §5), carried so that a
    /// host can size its pool from the same config blob.
    pub thread_count: i32,
    /// Maximum number of OpenMP-equivalent threads the sparse-matrix
    /// kernel may use; `-1` means "use the kernel's default".
    pub omp_thread_count: i32,
    /// Cache size hint, per graph per thread. Opaque to the core.
    pub cache_size: u64,
    /// Maximum number of entities a single persisted shard may hold.
    /// `VKEY_ENTITY_COUNT_UNLIMITED` means "one shard, no limit".
    pub vkey_entity_count: u64,
    /// If true, maintain `R_tᵀ` for every relation type, enabling O(1)
    /// incoming-edge lookups instead of a full scan (§3, §4.4).
    pub maintain_transposed_matrices: bool,
    /// Hint: if true, a host *may* defer whole-graph deletion. The core
    /// always deletes synchronously (§9 open question) — this field is
    /// read but not acted upon.
    pub async_delete: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thread_count: 1,
            omp_thread_count: -1,
            cache_size: 0,
            vkey_entity_count: VKEY_ENTITY_COUNT_UNLIMITED,
            maintain_transposed_matrices: true,
            async_delete: false,
        }
    }
}
