//! `bind_*`/`clear_bindings` family (spec.md §6, §4.4 "Bind").
//!
//! A statement the shim redirected gets its value captured into its own
//! [`crate::statement::Statement::bind`] slot instead of the shadow handle;
//! anything else passes straight through to the shadow library so
//! non-redirected statements see no behavior change (spec.md §1).

use super::catch_ffi;
use crate::precached;
use crate::registry;
use crate::value::ParamValue;
use pg_shim_sys::{sqlite3_stmt, sqlite3_value, SQLITE_MISUSE, SQLITE_OK};
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use std::sync::Arc;

fn shim_statement(stmt: *mut sqlite3_stmt) -> Option<Arc<parking_lot::Mutex<crate::statement::Statement>>> {
    registry::lookup_statement(stmt).or_else(|| precached::lookup(stmt))
}

fn bind_ours(stmt: *mut sqlite3_stmt, idx: c_int, value: ParamValue) -> Option<c_int> {
    let obj = shim_statement(stmt)?;
    let mut guard = obj.lock();
    Some(match guard.bind(idx as usize, value) {
        Ok(()) => SQLITE_OK,
        Err(_) => SQLITE_MISUSE,
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_bind_int(stmt: *mut sqlite3_stmt, idx: c_int, value: c_int) -> c_int {
    catch_ffi(|| {
        if let Some(rc) = bind_ours(stmt, idx, ParamValue::Int(value as i64)) {
            return rc;
        }
        pg_shim_sys::sqlite3_bind_int(stmt, idx, value)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_bind_int64(
    stmt: *mut sqlite3_stmt,
    idx: c_int,
    value: pg_shim_sys::sqlite3_int64,
) -> c_int {
    catch_ffi(|| {
        if let Some(rc) = bind_ours(stmt, idx, ParamValue::Int(value)) {
            return rc;
        }
        pg_shim_sys::sqlite3_bind_int64(stmt, idx, value)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_bind_double(stmt: *mut sqlite3_stmt, idx: c_int, value: f64) -> c_int {
    catch_ffi(|| {
        if let Some(rc) = bind_ours(stmt, idx, ParamValue::Double(value)) {
            return rc;
        }
        pg_shim_sys::sqlite3_bind_double(stmt, idx, value)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_bind_null(stmt: *mut sqlite3_stmt, idx: c_int) -> c_int {
    catch_ffi(|| {
        if let Some(rc) = bind_ours(stmt, idx, ParamValue::Null) {
            return rc;
        }
        pg_shim_sys::sqlite3_bind_null(stmt, idx)
    })
}

unsafe fn text_with_len(text: *const c_char, n: c_int) -> String {
    if n < 0 {
        CStr::from_ptr(text).to_string_lossy().into_owned()
    } else {
        let slice = std::slice::from_raw_parts(text.cast::<u8>(), n as usize);
        String::from_utf8_lossy(slice).into_owned()
    }
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_bind_text(
    stmt: *mut sqlite3_stmt,
    idx: c_int,
    text: *const c_char,
    n: c_int,
    destructor: pg_shim_sys::sqlite3_destructor_type,
) -> c_int {
    catch_ffi(|| {
        if text.is_null() {
            return bind_ours(stmt, idx, ParamValue::Null)
                .unwrap_or_else(|| pg_shim_sys::sqlite3_bind_null(stmt, idx));
        }
        if shim_statement(stmt).is_some() {
            let s = text_with_len(text, n);
            return bind_ours(stmt, idx, ParamValue::Text(s)).unwrap_or(SQLITE_MISUSE);
        }
        pg_shim_sys::sqlite3_bind_text(stmt, idx, text, n, destructor)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_bind_text64(
    stmt: *mut sqlite3_stmt,
    idx: c_int,
    text: *const c_char,
    n: pg_shim_sys::sqlite3_uint64,
    destructor: pg_shim_sys::sqlite3_destructor_type,
    encoding: libc::c_uchar,
) -> c_int {
    catch_ffi(|| {
        if text.is_null() {
            return bind_ours(stmt, idx, ParamValue::Null)
                .unwrap_or_else(|| pg_shim_sys::sqlite3_bind_null(stmt, idx));
        }
        if shim_statement(stmt).is_some() {
            let slice = std::slice::from_raw_parts(text.cast::<u8>(), n as usize);
            let s = String::from_utf8_lossy(slice).into_owned();
            return bind_ours(stmt, idx, ParamValue::Text(s)).unwrap_or(SQLITE_MISUSE);
        }
        pg_shim_sys::sqlite3_bind_text64(stmt, idx, text, n, destructor, encoding)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_bind_blob(
    stmt: *mut sqlite3_stmt,
    idx: c_int,
    data: *const c_void,
    n: c_int,
    destructor: pg_shim_sys::sqlite3_destructor_type,
) -> c_int {
    catch_ffi(|| {
        if data.is_null() || n <= 0 {
            return bind_ours(stmt, idx, ParamValue::Blob(Default::default()))
                .unwrap_or_else(|| pg_shim_sys::sqlite3_bind_blob(stmt, idx, data, n, destructor));
        }
        if shim_statement(stmt).is_some() {
            let slice = std::slice::from_raw_parts(data.cast::<u8>(), n as usize);
            let bytes = smallvec::SmallVec::from_slice(slice);
            return bind_ours(stmt, idx, ParamValue::Blob(bytes)).unwrap_or(SQLITE_MISUSE);
        }
        pg_shim_sys::sqlite3_bind_blob(stmt, idx, data, n, destructor)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_bind_blob64(
    stmt: *mut sqlite3_stmt,
    idx: c_int,
    data: *const c_void,
    n: pg_shim_sys::sqlite3_uint64,
    destructor: pg_shim_sys::sqlite3_destructor_type,
) -> c_int {
    catch_ffi(|| {
        if shim_statement(stmt).is_some() && !data.is_null() {
            let slice = std::slice::from_raw_parts(data.cast::<u8>(), n as usize);
            let bytes = smallvec::SmallVec::from_slice(slice);
            return bind_ours(stmt, idx, ParamValue::Blob(bytes)).unwrap_or(SQLITE_MISUSE);
        }
        pg_shim_sys::sqlite3_bind_blob64(stmt, idx, data, n, destructor)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_bind_value(
    stmt: *mut sqlite3_stmt,
    idx: c_int,
    value: *const sqlite3_value,
) -> c_int {
    catch_ffi(|| {
        // A `sqlite3_value*` carried across statements is opaque to us
        // unless it is one of our own fake values, which never appear here
        // (the host never rebinds one as input); delegate to the shadow.
        pg_shim_sys::sqlite3_bind_value(stmt, idx, value)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_clear_bindings(stmt: *mut sqlite3_stmt) -> c_int {
    catch_ffi(|| {
        if let Some(obj) = shim_statement(stmt) {
            obj.lock().clear_bindings();
        }
        pg_shim_sys::sqlite3_clear_bindings(stmt)
    })
}
