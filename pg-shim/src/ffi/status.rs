//! `changes`/`changes64`/`last_insert_rowid`/`errcode`/`errmsg` (spec.md §6
//! "status").
//!
//! `errcode`/`errmsg` are never overridden for a redirected handle (spec.md
//! §7 "Propagation": "the host's `errmsg`/`errcode` entry points continue
//! to reflect the underlying library's last-error state for the handle —
//! the shim does not overwrite it"), so those two forward unconditionally
//! to the shadow handle. `changes`/`changes64`/`last_insert_rowid` answer
//! from the redirected [`crate::connection::Connection`] counters when one
//! is registered for the handle.

use super::catch_ffi;
use crate::registry;
use pg_shim_sys::{sqlite3, sqlite3_int64};
use std::os::raw::{c_char, c_int};

#[no_mangle]
pub unsafe extern "C" fn sqlite3_changes(db: *mut sqlite3) -> c_int {
    catch_ffi(|| {
        if let Some(conn) = registry::lookup_connection(db) {
            return conn.last_changes() as c_int;
        }
        pg_shim_sys::sqlite3_changes(db)
    })
}

/// Catch a panic in an `i64`-returning entry point without truncating
/// through `catch_ffi`'s `c_int` convention (spec.md §9: no panic crosses
/// the FFI boundary, regardless of the wrapped function's return width).
unsafe fn catch_i64(f: impl FnOnce() -> sqlite3_int64) -> sqlite3_int64 {
    crate::ensure_initialized();
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(v) => v,
        Err(_) => {
            tracing::error!("panic caught at ffi boundary, returning 0");
            0
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_changes64(db: *mut sqlite3) -> sqlite3_int64 {
    catch_i64(|| {
        if let Some(conn) = registry::lookup_connection(db) {
            return conn.last_changes();
        }
        pg_shim_sys::sqlite3_changes64(db)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_last_insert_rowid(db: *mut sqlite3) -> sqlite3_int64 {
    catch_i64(|| {
        if let Some(conn) = registry::lookup_connection(db) {
            return conn.last_insert_rowid();
        }
        pg_shim_sys::sqlite3_last_insert_rowid(db)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_errcode(db: *mut sqlite3) -> c_int {
    catch_ffi(|| pg_shim_sys::sqlite3_errcode(db))
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_errmsg(db: *mut sqlite3) -> *const c_char {
    // Pointer-returning, not int-returning: not routed through `catch_ffi`
    // (which is typed for SQLite's c_int return convention). A panic here
    // would still be a host-visible crash, so guard it directly.
    crate::ensure_initialized();
    match std::panic::catch_unwind(|| pg_shim_sys::sqlite3_errmsg(db)) {
        Ok(ptr) => ptr,
        Err(_) => std::ptr::null(),
    }
}
