//! `column_*`/`data_count` family (spec.md §6 "columns", §4.5 "Result
//! Adapter").
//!
//! Column count/type/name answer from the attached result's own shape, so
//! they are correct even before the first row has been stepped (spec.md §8
//! scenario 4: `column_count` is 1 for a zero-row result). Everything else
//! answers from the current row, returning the type's null/zero value for
//! an out-of-range column rather than touching engine state (spec.md §3
//! "Bounds safety").

use super::catch_ffi;
use crate::precached;
use crate::registry;
use crate::value::SqliteType;
use pg_shim_sys::{
    sqlite3_stmt, sqlite3_value, SQLITE_BLOB, SQLITE_FLOAT, SQLITE_INTEGER, SQLITE_NULL, SQLITE_TEXT,
};
use std::os::raw::{c_char, c_int, c_void};
use std::sync::Arc;

fn shim_statement(stmt: *mut sqlite3_stmt) -> Option<Arc<parking_lot::Mutex<crate::statement::Statement>>> {
    registry::lookup_statement(stmt).or_else(|| precached::lookup(stmt))
}

/// Catch a panic in a pointer-returning accessor (spec.md §9).
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
pub unsafe extern "C" fn sqlite3_column_count(stmt: *mut sqlite3_stmt) -> c_int {
    catch_ffi(|| {
        if let Some(obj) = shim_statement(stmt) {
            return obj.lock().num_cols() as c_int;
        }
        pg_shim_sys::sqlite3_column_count(stmt)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_data_count(stmt: *mut sqlite3_stmt) -> c_int {
    catch_ffi(|| {
        if let Some(obj) = shim_statement(stmt) {
            let guard = obj.lock();
            return if guard.current_row() < 0 { 0 } else { guard.num_cols() as c_int };
        }
        pg_shim_sys::sqlite3_data_count(stmt)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_column_type(stmt: *mut sqlite3_stmt, col: c_int) -> c_int {
    catch_ffi(|| {
        if let Some(obj) = shim_statement(stmt) {
            if col < 0 {
                return SQLITE_NULL;
            }
            return match obj.lock().column_type(col as usize) {
                SqliteType::Integer => SQLITE_INTEGER,
                SqliteType::Float => SQLITE_FLOAT,
                SqliteType::Text => SQLITE_TEXT,
                SqliteType::Blob => SQLITE_BLOB,
                SqliteType::Null => SQLITE_NULL,
            };
        }
        pg_shim_sys::sqlite3_column_type(stmt, col)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_column_name(stmt: *mut sqlite3_stmt, col: c_int) -> *const c_char {
    catch(std::ptr::null(), || {
        if let Some(obj) = shim_statement(stmt) {
            if col < 0 {
                return std::ptr::null();
            }
            return obj.lock().column_name(col as usize).0.cast();
        }
        pg_shim_sys::sqlite3_column_name(stmt, col)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_column_decltype(stmt: *mut sqlite3_stmt, col: c_int) -> *const c_char {
    catch(std::ptr::null(), || {
        if let Some(obj) = shim_statement(stmt) {
            if col < 0 {
                return std::ptr::null();
            }
            let (ptr, len) = obj.lock().column_decltype(col as usize);
            if !ptr.is_null() && len > 0 {
                return ptr.cast();
            }
            // No metadata row for this column; fall through to the
            // shadow statement's own decltype (spec.md §4.5: "falling
            // back to the OID mapping when no declared type is known" —
            // the shadow engine's decltype is the most faithful fallback
            // available for the exact declared-type string).
        }
        pg_shim_sys::sqlite3_column_decltype(stmt, col)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_column_int(stmt: *mut sqlite3_stmt, col: c_int) -> c_int {
    catch_ffi(|| {
        if let Some(obj) = shim_statement(stmt) {
            if col < 0 {
                return 0;
            }
            return obj.lock().column_int(col as usize) as c_int;
        }
        pg_shim_sys::sqlite3_column_int(stmt, col)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_column_int64(stmt: *mut sqlite3_stmt, col: c_int) -> pg_shim_sys::sqlite3_int64 {
    catch(0, || {
        if let Some(obj) = shim_statement(stmt) {
            if col < 0 {
                return 0;
            }
            return obj.lock().column_int(col as usize);
        }
        pg_shim_sys::sqlite3_column_int64(stmt, col)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_column_double(stmt: *mut sqlite3_stmt, col: c_int) -> f64 {
    catch(0.0, || {
        if let Some(obj) = shim_statement(stmt) {
            if col < 0 {
                return 0.0;
            }
            return obj.lock().column_double(col as usize);
        }
        pg_shim_sys::sqlite3_column_double(stmt, col)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_column_text(stmt: *mut sqlite3_stmt, col: c_int) -> *const u8 {
    catch(std::ptr::null(), || {
        if let Some(obj) = shim_statement(stmt) {
            if col < 0 {
                return std::ptr::null();
            }
            return obj.lock().column_text(col as usize).0;
        }
        pg_shim_sys::sqlite3_column_text(stmt, col)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_column_bytes(stmt: *mut sqlite3_stmt, col: c_int) -> c_int {
    catch_ffi(|| {
        if let Some(obj) = shim_statement(stmt) {
            if col < 0 {
                return 0;
            }
            let mut guard = obj.lock();
            return match guard.column_type(col as usize) {
                SqliteType::Blob => guard.column_blob(col as usize).1,
                _ => guard.column_text(col as usize).1,
            };
        }
        pg_shim_sys::sqlite3_column_bytes(stmt, col)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_column_blob(stmt: *mut sqlite3_stmt, col: c_int) -> *const c_void {
    catch(std::ptr::null(), || {
        if let Some(obj) = shim_statement(stmt) {
            if col < 0 {
                return std::ptr::null();
            }
            return obj.lock().column_blob(col as usize).0.cast();
        }
        pg_shim_sys::sqlite3_column_blob(stmt, col)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_column_value(stmt: *mut sqlite3_stmt, col: c_int) -> *mut sqlite3_value {
    catch(std::ptr::null_mut(), || {
        if let Some(obj) = shim_statement(stmt) {
            if col < 0 {
                return std::ptr::null_mut();
            }
            return obj.lock().claim_fake_value(stmt, col as usize);
        }
        pg_shim_sys::sqlite3_column_value(stmt, col)
    })
}
