//! `step`/`reset`/`finalize` (spec.md §6, §4.4 "Step").

use super::catch_ffi;
use super::prepare::{GENERATOR_ENTITY_HINT, UPSERT_POLICY};
use crate::classifier;
use crate::config::CONFIG;
use crate::precached;
use crate::registry;
use crate::statement::{Statement, StepOutcome};
use crate::upsert::WritePolicy;
use pg_shim_sys::{sqlite3_stmt, SQLITE_DONE, SQLITE_ERROR, SQLITE_ROW};
use std::ffi::CStr;
use std::os::raw::c_int;
use std::sync::Arc;
use tracing::{error, warn};

/// Discover a statement the shim never saw `prepare` for (spec.md §3/§4.4
/// "Per-thread cached-pre-existing registry"): statements a host cached at
/// startup, before the shim's `prepare` interposition was in effect. On
/// first redirected `step`, recover the statement's owning connection via
/// `sqlite3_db_handle`, and if that connection is one we redirected,
/// recover its bound SQL text via `sqlite3_sql` (SQLiteLib materializes
/// parameter-free SQL here; bound values aren't visible to us this way,
/// same limitation as the original's approach to this discovery), classify
/// and translate it the same as a normal `prepare`, and register the
/// resulting shim statement in the thread-local precached registry so
/// later steps from this thread find it without rediscovery.
unsafe fn discover(stmt: *mut sqlite3_stmt) -> Option<Arc<parking_lot::Mutex<Statement>>> {
    let db = pg_shim_sys::sqlite3_db_handle(stmt);
    if db.is_null() {
        return None;
    }
    let conn = registry::lookup_connection(db)?;

    let sql_ptr = pg_shim_sys::sqlite3_sql(stmt);
    if sql_ptr.is_null() {
        return None;
    }
    let sql_str = CStr::from_ptr(sql_ptr).to_string_lossy().into_owned();

    let classification = classifier::classify(&sql_str, &conn.path, &CONFIG);
    if !classification.redirect {
        return None;
    }

    match Statement::prepare(
        conn,
        &sql_str,
        classification.kind,
        classification.skip,
        Some(&*UPSERT_POLICY as &dyn WritePolicy),
        Some(GENERATOR_ENTITY_HINT),
    ) {
        Ok(stmt_obj) => Some(precached::insert(stmt, stmt_obj)),
        Err(e) => {
            warn!(sql = %sql_str, error = %e, "translation failed discovering a pre-existing statement");
            None
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_step(stmt: *mut sqlite3_stmt) -> c_int {
    catch_ffi(|| {
        let obj = match registry::lookup_statement(stmt)
            .or_else(|| precached::lookup(stmt))
            .or_else(|| discover(stmt))
        {
            Some(obj) => obj,
            None => return pg_shim_sys::sqlite3_step(stmt),
        };
        let mut guard = obj.lock();
        match guard.step(&CONFIG) {
            Ok(StepOutcome::Row) => SQLITE_ROW,
            Ok(StepOutcome::Done) => SQLITE_DONE,
            Err(e) => {
                error!(error = %e, "step failed");
                SQLITE_ERROR
            }
        }
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_reset(stmt: *mut sqlite3_stmt) -> c_int {
    catch_ffi(|| {
        if let Some(obj) = registry::lookup_statement(stmt).or_else(|| precached::lookup(stmt)) {
            obj.lock().reset();
        }
        pg_shim_sys::sqlite3_reset(stmt)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_finalize(stmt: *mut sqlite3_stmt) -> c_int {
    catch_ffi(|| {
        registry::remove_statement(stmt);
        precached::remove(stmt);
        pg_shim_sys::sqlite3_finalize(stmt)
    })
}
