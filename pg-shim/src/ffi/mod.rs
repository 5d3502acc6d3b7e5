//! Interposition surface (spec.md §2 "Interposition Surface", §6).
//!
//! Every symbol in here is exported with the embedded library's exact C
//! name and signature, binary-compatible with the host's expectations. The
//! loader mechanism that actually redirects the host's dynamic symbol
//! lookups here is out of scope (spec.md §1) — this module only supplies
//! the replacement bodies. Per spec.md §9, no internal failure is allowed
//! to unwind across these boundaries; every entry point runs its body
//! through [`catch_ffi`].

mod bind;
mod collation;
mod column;
mod exec;
mod open;
mod prepare;
mod status;
mod step;
mod value;

use pg_shim_sys::{SQLITE_ERROR, SQLITE_MISUSE};
use std::os::raw::c_int;
use tracing::error;

/// Run `f`, converting a panic into `SQLITE_ERROR` instead of letting it
/// unwind into the host (spec.md §9).
pub(crate) fn catch_ffi(f: impl FnOnce() -> c_int) -> c_int {
    crate::ensure_initialized();
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(code) => code,
        Err(_) => {
            error!("panic caught at ffi boundary, returning SQLITE_ERROR");
            SQLITE_ERROR
        }
    }
}

/// Shorthand for the common "null pointer from the host" guard (spec.md §7
/// `BAD_INPUT`).
pub(crate) fn require_non_null<T>(ptr: *const T) -> Result<(), c_int> {
    if ptr.is_null() {
        Err(SQLITE_MISUSE)
    } else {
        Ok(())
    }
}
