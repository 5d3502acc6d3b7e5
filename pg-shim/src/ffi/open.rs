//! `open`/`open(v2)`/`close`/`close(v2)` (spec.md §6 "open/close").

use super::catch_ffi;
use crate::config::CONFIG;
use crate::connection::Connection;
use crate::registry;
use pg_shim_sys::{sqlite3, SQLITE_MISUSE, SQLITE_OK, SQLITE_OPEN_CREATE, SQLITE_OPEN_READWRITE};
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::ptr;
use tracing::{info, warn};

/// A shadow handle is always opened so the host keeps a valid opaque
/// pointer and passthrough databases keep working unchanged (spec.md §1).
fn open_shadow_and_maybe_redirect(
    filename: *const c_char,
    flags: c_int,
    vfs: *const c_char,
    ppdb: *mut *mut sqlite3,
) -> c_int {
    if ppdb.is_null() {
        return SQLITE_MISUSE;
    }
    let mut shadow: *mut sqlite3 = ptr::null_mut();
    let rc = unsafe { pg_shim_sys::sqlite3_open_v2(filename, &mut shadow, flags, vfs) };
    unsafe {
        *ppdb = shadow;
    }
    if rc != SQLITE_OK {
        return rc;
    }

    let path = if filename.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(filename) }.to_string_lossy().into_owned()
    };

    if CONFIG.matches(&path) {
        let pooled = CONFIG.pooled(&path);
        match Connection::open(&path, pooled, &CONFIG) {
            Ok(conn) => {
                registry::register_connection(shadow, conn);
                info!(path = %path, pooled, "redirected database opened");
            }
            Err(e) => {
                warn!(path = %path, error = %e, "failed to open server connection, passthrough only");
            }
        }
    }

    SQLITE_OK
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_open(filename: *const c_char, ppdb: *mut *mut sqlite3) -> c_int {
    catch_ffi(|| {
        open_shadow_and_maybe_redirect(
            filename,
            SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE,
            ptr::null(),
            ppdb,
        )
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_open_v2(
    filename: *const c_char,
    ppdb: *mut *mut sqlite3,
    flags: c_int,
    vfs: *const c_char,
) -> c_int {
    catch_ffi(|| open_shadow_and_maybe_redirect(filename, flags, vfs, ppdb))
}

fn close_impl(db: *mut sqlite3) -> c_int {
    if let Some(conn) = registry::remove_connection(db) {
        conn.close();
    }
    unsafe { pg_shim_sys::sqlite3_close(db) }
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_close(db: *mut sqlite3) -> c_int {
    catch_ffi(|| close_impl(db))
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_close_v2(db: *mut sqlite3) -> c_int {
    catch_ffi(|| close_impl(db))
}
