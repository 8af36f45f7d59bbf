//! Error taxonomy (§7). Kinds, not types — every public operation returns
//! `Result<T>`; nothing panics except on a programming-error invariant
//! violation (`debug_assert!` on I1–I6), matching the teacher's sparing
//! use of `expect()` only where an invariant "always" holds.

use thiserror::Error as ThisError;

#[derive(Debug, ThisError, PartialEq, Eq)]
pub enum Error {
    #[error("invalid {kind} id: {id}")]
    InvalidId { kind: &'static str, id: u64 },

    #[error("unknown {kind} name: {name}")]
    InvalidName { kind: &'static str, name: String },

    #[error("resource exhausted: {0}")]
    Resource(String),

    #[error("inconsistent persisted state: {0}")]
    Consistency(String),

    #[error("concurrency violation: {0}")]
    Concurrency(String),

    #[error("operation not supported: {0}")]
    NotSupported(String),
}

pub type Result<T> = std::result::Result<T, Error>;
