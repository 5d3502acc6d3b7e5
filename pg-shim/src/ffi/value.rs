//! `value_*` family (spec.md §6 "values", §4.5 "Column-value", §3
//! "Fake-value object").
//!
//! Each accessor recognizes a fake value by address (see
//! [`FakeValuePool::recognize`]) and, when recognized, routes the read back
//! through the owning statement's result under its mutex; an unrecognized
//! pointer is assumed to be the shadow library's own `sqlite3_value*` and
//! is forwarded unchanged.

use super::catch_ffi;
use crate::fakevalue::FakeValuePool;
use crate::precached;
use crate::registry;
use crate::value::SqliteType;
use pg_shim_sys::{sqlite3_value, SQLITE_BLOB, SQLITE_FLOAT, SQLITE_INTEGER, SQLITE_NULL, SQLITE_TEXT};
use std::os::raw::{c_int, c_void};

/// Resolve a fake value back to its owning statement's current cell, if
/// `value` is one of ours (spec.md §3 "Fake-value object").
fn resolve(
    value: *mut sqlite3_value,
) -> Option<(std::sync::Arc<parking_lot::Mutex<crate::statement::Statement>>, usize)> {
    let fv = FakeValuePool::recognize(value)?;
    let stmt = registry::lookup_statement(fv.stmt).or_else(|| precached::lookup(fv.stmt))?;
    Some((stmt, fv.column))
}

/// Catch a panic in a non-`c_int`-returning accessor (spec.md §9: no
/// panic crosses the FFI boundary, whatever the wrapped return type).
unsafe fn catch<T>(default: T, f: impl FnOnce() -> T) -> T {
    crate::ensure_initialized();
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(v) => v,
        Err(_) => {
            tracing::error!("panic caught at ffi boundary");
            default
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_value_type(value: *mut sqlite3_value) -> c_int {
    catch_ffi(|| {
        if let Some((stmt, col)) = resolve(value) {
            let guard = stmt.lock();
            return match guard.column_type(col) {
                SqliteType::Integer => SQLITE_INTEGER,
                SqliteType::Float => SQLITE_FLOAT,
                SqliteType::Text => SQLITE_TEXT,
                SqliteType::Blob => SQLITE_BLOB,
                SqliteType::Null => SQLITE_NULL,
            };
        }
        pg_shim_sys::sqlite3_value_type(value)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_value_int(value: *mut sqlite3_value) -> c_int {
    catch_ffi(|| {
        if let Some((stmt, col)) = resolve(value) {
            return stmt.lock().column_int(col) as c_int;
        }
        pg_shim_sys::sqlite3_value_int(value)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_value_int64(value: *mut sqlite3_value) -> pg_shim_sys::sqlite3_int64 {
    catch(0, || {
        if let Some((stmt, col)) = resolve(value) {
            return stmt.lock().column_int(col);
        }
        pg_shim_sys::sqlite3_value_int64(value)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_value_double(value: *mut sqlite3_value) -> f64 {
    catch(0.0, || {
        if let Some((stmt, col)) = resolve(value) {
            return stmt.lock().column_double(col);
        }
        pg_shim_sys::sqlite3_value_double(value)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_value_text(value: *mut sqlite3_value) -> *const u8 {
    catch(std::ptr::null(), || {
        if let Some((stmt, col)) = resolve(value) {
            return stmt.lock().column_text(col).0;
        }
        pg_shim_sys::sqlite3_value_text(value)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_value_bytes(value: *mut sqlite3_value) -> c_int {
    catch_ffi(|| {
        if let Some((stmt, col)) = resolve(value) {
            let mut guard = stmt.lock();
            return match guard.column_type(col) {
                SqliteType::Blob => guard.column_blob(col).1,
                _ => guard.column_text(col).1,
            };
        }
        pg_shim_sys::sqlite3_value_bytes(value)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_value_blob(value: *mut sqlite3_value) -> *const c_void {
    catch(std::ptr::null(), || {
        if let Some((stmt, col)) = resolve(value) {
            return stmt.lock().column_blob(col).0.cast();
        }
        pg_shim_sys::sqlite3_value_blob(value)
    })
}
