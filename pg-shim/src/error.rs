//! Error taxonomy for the shim's internal engine.
//!
//! None of these ever reach the host directly: every FFI entry point in
//! [`crate::ffi`] catches them and translates them into the embedded
//! library's return-code convention (see spec.md §7 / SPEC_FULL.md). This
//! type exists so internal components can propagate failures with
//! `Result`/`?` the way the teacher crate's own `rusqlite::Error` does,
//! before that final translation happens at the boundary.

use pg_shim_sys::sqlite3_stmt;

/// Failure taxonomy, one variant per category in spec.md §7.
#[derive(Debug, thiserror::Error)]
pub enum ShimError {
    #[error("bad input: {0}")]
    BadInput(&'static str),

    #[error("translation failed: {0}")]
    TranslationFailure(String),

    #[error("server execution failed: {0}")]
    ServerExecFailure(String),

    #[error("connection failure: {0}")]
    ConnectionFailure(String),

    #[error("column/row index {index} out of bounds (max {bound})")]
    BoundsViolation { index: i64, bound: i64 },

    #[error("type mismatch on column {0}")]
    TypeMismatch(usize),

    #[error("statement already registered")]
    DoubleRegistration,
}

pub type ShimResult<T> = Result<T, ShimError>;

/// A marker pointer type, used only so log lines can name which raw
/// statement pointer a failure occurred on without dereferencing it.
pub(crate) fn stmt_ptr_tag(p: *mut sqlite3_stmt) -> usize {
    p as usize
}
