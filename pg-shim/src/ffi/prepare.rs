//! `prepare`/`prepare(v2)`/`prepare(v3)`/`prepare16(v2)` (spec.md §6, §4.4
//! "Prepare").

use super::catch_ffi;
use crate::classifier;
use crate::config::CONFIG;
use crate::registry;
use crate::statement::Statement;
use crate::upsert::{SettingsUpsertPolicy, WritePolicy};
use once_cell::sync::Lazy;
use pg_shim_sys::{sqlite3, sqlite3_stmt, SQLITE_ERROR, SQLITE_MISUSE, SQLITE_OK};
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::ptr;
use tracing::{debug, warn};

/// The one concrete write policy shipped (spec.md §9's settings-upsert
/// open question); swap or extend via [`WritePolicy`] for other hosts.
/// `pub(super)` so [`super::step`]'s cached-pre-existing discovery path can
/// apply the same policy a normal `prepare` would have.
pub(super) static UPSERT_POLICY: Lazy<SettingsUpsertPolicy> = Lazy::new(|| {
    SettingsUpsertPolicy::new(
        "preferences",
        "id",
        vec!["watched".to_string(), "value".to_string()],
    )
});

/// The table whose inserts carry a generator-encoded item id to stash for
/// later `IN (NULL)` substitution (spec.md §4.4, last bullet). Shared with
/// [`super::step`]'s cached-pre-existing discovery path so both routes
/// apply the same hint a normal `prepare` would have.
pub(super) const GENERATOR_ENTITY_HINT: &str = "metadata_items";

fn prepare_impl(
    db: *mut sqlite3,
    sql: *const c_char,
    n_byte: c_int,
    pp_stmt: *mut *mut sqlite3_stmt,
    pz_tail: *mut *const c_char,
) -> c_int {
    if db.is_null() || sql.is_null() || pp_stmt.is_null() {
        return SQLITE_MISUSE;
    }

    let sql_str = unsafe { c_str_with_len(sql, n_byte) };

    let mut shadow: *mut sqlite3_stmt = ptr::null_mut();
    let rc = unsafe {
        pg_shim_sys::sqlite3_prepare_v2(db, sql.cast(), n_byte, &mut shadow, pz_tail)
    };
    unsafe {
        *pp_stmt = shadow;
    }
    if rc != SQLITE_OK {
        return rc;
    }
    if shadow.is_null() {
        // Empty/whitespace-only SQL: nothing to redirect.
        return SQLITE_OK;
    }

    let Some(conn) = registry::lookup_connection(db) else {
        return SQLITE_OK;
    };

    let classification = classifier::classify(&sql_str, &conn.path, &CONFIG);
    if !classification.redirect {
        return SQLITE_OK;
    }

    match Statement::prepare(
        conn,
        &sql_str,
        classification.kind,
        classification.skip,
        Some(&*UPSERT_POLICY as &dyn WritePolicy),
        Some(GENERATOR_ENTITY_HINT),
    ) {
        Ok(stmt_obj) => match registry::register_statement(shadow, stmt_obj) {
            Ok(_) => {
                debug!(sql = %sql_str, "statement redirected");
            }
            Err(()) => {
                warn!(sql = %sql_str, "statement pointer already registered");
            }
        },
        Err(e) => {
            warn!(sql = %sql_str, error = %e, "translation failed, statement marked unusable on server");
        }
    }

    SQLITE_OK
}

unsafe fn c_str_with_len(sql: *const c_char, n_byte: c_int) -> String {
    if n_byte < 0 {
        CStr::from_ptr(sql).to_string_lossy().into_owned()
    } else {
        let slice = std::slice::from_raw_parts(sql.cast::<u8>(), n_byte as usize);
        String::from_utf8_lossy(slice).into_owned()
    }
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_prepare(
    db: *mut sqlite3,
    sql: *const c_char,
    n_byte: c_int,
    pp_stmt: *mut *mut sqlite3_stmt,
    pz_tail: *mut *const c_char,
) -> c_int {
    catch_ffi(|| prepare_impl(db, sql, n_byte, pp_stmt, pz_tail))
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_prepare_v2(
    db: *mut sqlite3,
    sql: *const c_char,
    n_byte: c_int,
    pp_stmt: *mut *mut sqlite3_stmt,
    pz_tail: *mut *const c_char,
) -> c_int {
    catch_ffi(|| prepare_impl(db, sql, n_byte, pp_stmt, pz_tail))
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_prepare_v3(
    db: *mut sqlite3,
    sql: *const c_char,
    n_byte: c_int,
    _prep_flags: u32,
    pp_stmt: *mut *mut sqlite3_stmt,
    pz_tail: *mut *const c_char,
) -> c_int {
    catch_ffi(|| prepare_impl(db, sql, n_byte, pp_stmt, pz_tail))
}

/// UTF-16 variant. The shadow engine does the actual UTF-16 parsing; this
/// wrapper only needs a UTF-8 copy of the SQL text to classify/translate,
/// recovered from the shadow statement via `sqlite3_sql` after prepare
/// (the shadow library normalizes encoding for us).
#[no_mangle]
pub unsafe extern "C" fn sqlite3_prepare16_v2(
    db: *mut sqlite3,
    sql: *const std::os::raw::c_void,
    n_byte: c_int,
    pp_stmt: *mut *mut sqlite3_stmt,
    pz_tail: *mut *const std::os::raw::c_void,
) -> c_int {
    catch_ffi(|| {
        if db.is_null() || sql.is_null() || pp_stmt.is_null() {
            return SQLITE_MISUSE;
        }
        let mut shadow: *mut sqlite3_stmt = ptr::null_mut();
        let rc = pg_shim_sys::sqlite3_prepare16_v2(db, sql, n_byte, &mut shadow, pz_tail);
        *pp_stmt = shadow;
        if rc != SQLITE_OK || shadow.is_null() {
            return rc;
        }

        let Some(conn) = registry::lookup_connection(db) else {
            return SQLITE_OK;
        };

        let sql_ptr = pg_shim_sys::sqlite3_sql(shadow);
        if sql_ptr.is_null() {
            return SQLITE_OK;
        }
        let sql_str = CStr::from_ptr(sql_ptr).to_string_lossy().into_owned();

        let classification = classifier::classify(&sql_str, &conn.path, &CONFIG);
        if !classification.redirect {
            return SQLITE_OK;
        }

        match Statement::prepare(
            conn,
            &sql_str,
            classification.kind,
            classification.skip,
            Some(&*UPSERT_POLICY as &dyn WritePolicy),
            Some(GENERATOR_ENTITY_HINT),
        ) {
            Ok(stmt_obj) => {
                let _ = registry::register_statement(shadow, stmt_obj);
            }
            Err(e) => {
                warn!(sql = %sql_str, error = %e, "translation failed on prepare16 path");
            }
        }
        SQLITE_OK
    })
}
