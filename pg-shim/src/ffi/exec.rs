//! `exec`/`get_table` (spec.md §6 "exec").
//!
//! Both are convenience wrappers the real library layers over prepare/
//! step/finalize; this shim gives them the same redirected behavior
//! directly against the server channel instead of routing through the
//! full [`crate::statement::Statement`] lifecycle, since neither entry
//! point exposes a statement handle for the host to drive bind/step/reset
//! itself (spec.md §4.7: "the direct-execute entry point ... bypassing the
//! full statement lifecycle").

use super::catch_ffi;
use crate::classifier::{self, Kind};
use crate::config::CONFIG;
use crate::connection::Connection;
use crate::translator::translate;
use crate::registry;
use pg_shim_sys::{sqlite3, sqlite3_malloc, SQLITE_ERROR, SQLITE_OK};
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_void};
use std::sync::Arc;
use tracing::warn;

type ExecCallback = Option<extern "C" fn(*mut c_void, c_int, *mut *mut c_char, *mut *mut c_char) -> c_int>;

/// Split `sql` on top-level `;` so a multi-statement batch passed to
/// `sqlite3_exec` (legal under the real library) executes one statement at
/// a time, same as real SQLite's internal exec loop. Quote- and
/// placeholder-aware via the translator's own tokenizer so a `;` inside a
/// string literal is never mistaken for a statement boundary.
fn split_statements(sql: &str) -> Vec<String> {
    use crate::translator::token::{tokenize, Token};
    let tokens = tokenize(sql);
    let mut statements = Vec::new();
    let mut current = String::new();
    for tok in &tokens {
        if matches!(tok, Token::Punct(';')) {
            let trimmed = current.trim();
            if !trimmed.is_empty() {
                statements.push(trimmed.to_string());
            }
            current.clear();
        } else {
            current.push_str(&tok.text());
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
    statements
}

unsafe fn set_errmsg(errmsg: *mut *mut c_char, message: &str) {
    if errmsg.is_null() {
        return;
    }
    let len = message.len();
    let buf = sqlite3_malloc((len + 1) as c_int);
    if buf.is_null() {
        *errmsg = std::ptr::null_mut();
        return;
    }
    std::ptr::copy_nonoverlapping(message.as_ptr(), buf.cast(), len);
    *(buf.cast::<u8>().add(len)) = 0;
    *errmsg = buf.cast();
}

/// Run one already-translated statement against `conn`'s channel, invoking
/// `callback` once per row in the real `sqlite3_exec` calling convention.
fn run_one(
    conn: &Arc<Connection>,
    original_sql: &str,
    callback: ExecCallback,
    arg: *mut c_void,
) -> Result<(), String> {
    let classification = classifier::classify_with(original_sql, "", true, classifier::DEFAULT_SKIP_PATTERNS);
    if classification.skip {
        return Ok(());
    }

    let translated = translate(original_sql).map_err(|e| e.message)?;

    conn.with_channel(&CONFIG, |handle| {
        match classification.kind {
            Kind::Read => {
                let stmt = handle.channel.prepare(&translated.sql)?;
                let rows = handle.channel.query(&stmt, &[])?;
                if let Some(cb) = callback {
                    let col_names: Vec<CString> = stmt
                        .columns()
                        .iter()
                        .map(|c| CString::new(c.name()).unwrap_or_default())
                        .collect();
                    let mut col_name_ptrs: Vec<*mut c_char> =
                        col_names.iter().map(|c| c.as_ptr() as *mut c_char).collect();
                    for row in &rows {
                        let values: Vec<Option<CString>> = (0..row.len())
                            .map(|i| crate::result::cell_text(row, i).and_then(|s| CString::new(s).ok()))
                            .collect();
                        let mut value_ptrs: Vec<*mut c_char> = values
                            .iter()
                            .map(|v| v.as_ref().map(|c| c.as_ptr() as *mut c_char).unwrap_or(std::ptr::null_mut()))
                            .collect();
                        let rc = cb(
                            arg,
                            value_ptrs.len() as c_int,
                            value_ptrs.as_mut_ptr(),
                            col_name_ptrs.as_mut_ptr(),
                        );
                        if rc != 0 {
                            return Err(crate::error::ShimError::ServerExecFailure(
                                "callback requested abort".to_string(),
                            ));
                        }
                    }
                }
                Ok(())
            }
            Kind::Write => {
                let stmt = handle.channel.prepare(&translated.sql)?;
                let n = handle.channel.execute(&stmt, &[])?;
                if let Ok(id) = handle.channel.lastval() {
                    conn.set_last_insert_rowid(id);
                }
                conn.set_last_changes(n as i64);
                Ok(())
            }
            Kind::Other => handle.channel.simple_exec(&translated.sql),
        }
    })
    .map_err(|e| e.to_string())
}

fn exec_impl(
    db: *mut sqlite3,
    raw_sql: *const c_char,
    sql: &str,
    callback: ExecCallback,
    arg: *mut c_void,
    errmsg: *mut *mut c_char,
) -> c_int {
    let Some(conn) = registry::lookup_connection(db) else {
        return unsafe { pg_shim_sys::sqlite3_exec(db, raw_sql, callback, arg, errmsg) };
    };

    for statement in split_statements(sql) {
        if let Err(msg) = run_one(&conn, &statement, callback, arg) {
            warn!(sql = %statement, error = %msg, "exec failed on server, surfacing as SQLITE_ERROR");
            unsafe { set_errmsg(errmsg, &msg) };
            return SQLITE_ERROR;
        }
    }
    SQLITE_OK
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_exec(
    db: *mut sqlite3,
    sql: *const c_char,
    callback: ExecCallback,
    arg: *mut c_void,
    errmsg: *mut *mut c_char,
) -> c_int {
    catch_ffi(|| {
        if db.is_null() || sql.is_null() {
            return pg_shim_sys::SQLITE_MISUSE;
        }
        let sql_str = CStr::from_ptr(sql).to_string_lossy().into_owned();
        exec_impl(db, sql, &sql_str, callback, arg, errmsg)
    })
}

/// Row accumulator used by [`sqlite3_get_table`]'s callback bridge.
struct TableAccumulator {
    ncolumn: usize,
    column_names: Option<Vec<String>>,
    rows: Vec<Vec<Option<String>>>,
}

extern "C" fn get_table_callback(
    arg: *mut c_void,
    argc: c_int,
    argv: *mut *mut c_char,
    col_names: *mut *mut c_char,
) -> c_int {
    unsafe {
        let acc = &mut *arg.cast::<TableAccumulator>();
        let argc = argc as usize;
        acc.ncolumn = argc;
        if acc.column_names.is_none() {
            let names = (0..argc)
                .map(|i| {
                    let p = *col_names.add(i);
                    if p.is_null() {
                        String::new()
                    } else {
                        CStr::from_ptr(p).to_string_lossy().into_owned()
                    }
                })
                .collect();
            acc.column_names = Some(names);
        }
        let row = (0..argc)
            .map(|i| {
                let p = *argv.add(i);
                if p.is_null() {
                    None
                } else {
                    Some(CStr::from_ptr(p).to_string_lossy().into_owned())
                }
            })
            .collect();
        acc.rows.push(row);
        0
    }
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_get_table(
    db: *mut sqlite3,
    sql: *const c_char,
    presult: *mut *mut *mut c_char,
    nrow: *mut c_int,
    ncolumn: *mut c_int,
    errmsg: *mut *mut c_char,
) -> c_int {
    catch_ffi(|| {
        if db.is_null() || sql.is_null() || presult.is_null() {
            return pg_shim_sys::SQLITE_MISUSE;
        }
        if registry::lookup_connection(db).is_none() {
            return pg_shim_sys::sqlite3_get_table(db, sql, presult, nrow, ncolumn, errmsg);
        }

        let sql_str = CStr::from_ptr(sql).to_string_lossy().into_owned();
        let mut acc = TableAccumulator {
            ncolumn: 0,
            column_names: None,
            rows: Vec::new(),
        };
        let acc_ptr = &mut acc as *mut TableAccumulator as *mut c_void;
        let rc = exec_impl(db, sql, &sql_str, Some(get_table_callback), acc_ptr, errmsg);
        if rc != SQLITE_OK {
            *presult = std::ptr::null_mut();
            *nrow = 0;
            *ncolumn = 0;
            return rc;
        }

        let col_names = acc.column_names.unwrap_or_default();
        let ncol = col_names.len().max(acc.ncolumn);
        let nrows = acc.rows.len();

        // Layout matches real `sqlite3_get_table`/`sqlite3_free_table`:
        // element 0 of the allocated block is a reserved slot carrying the
        // total pointer count, the returned array starts at element 1, each
        // string cell is its own `sqlite3_malloc` allocation so the
        // shadow library's unmodified `sqlite3_free_table` (not one of our
        // interposed entries) can free this layout unchanged.
        let total = 1 + ncol * (nrows + 1);
        let block = sqlite3_malloc((total * std::mem::size_of::<*mut c_char>()) as c_int) as *mut *mut c_char;
        if block.is_null() {
            *presult = std::ptr::null_mut();
            *nrow = 0;
            *ncolumn = 0;
            return SQLITE_ERROR;
        }
        *block = total as *mut c_char;
        let azresult = block.add(1);

        for (i, name) in col_names.iter().enumerate() {
            *azresult.add(i) = alloc_cstr(name);
        }
        for (r, row) in acc.rows.iter().enumerate() {
            for c in 0..ncol {
                let idx = ncol + r * ncol + c;
                *azresult.add(idx) = match row.get(c).and_then(|v| v.as_ref()) {
                    Some(s) => alloc_cstr(s),
                    None => std::ptr::null_mut(),
                };
            }
        }

        *presult = azresult;
        *nrow = nrows as c_int;
        *ncolumn = ncol as c_int;
        SQLITE_OK
    })
}

unsafe fn alloc_cstr(s: &str) -> *mut c_char {
    let buf = sqlite3_malloc((s.len() + 1) as c_int);
    if buf.is_null() {
        return std::ptr::null_mut();
    }
    std::ptr::copy_nonoverlapping(s.as_ptr(), buf.cast(), s.len());
    *(buf.cast::<u8>().add(s.len())) = 0;
    buf.cast()
}
