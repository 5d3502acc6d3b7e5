//! `create_collation`/`create_collation(v2)` (spec.md §6 "collation").
//!
//! ServerDB has no concept of the embedded library's per-connection
//! ICU-backed collations, and the translator already strips `COLLATE
//! <icu_locale>` clauses from redirected SQL (spec.md §4.2 "Keywords/
//! quoting"), so a collation registered against a redirected handle can
//! never be invoked server-side. Per spec.md §6, such calls (including
//! locale-suffixed names, e.g. `"unicode_ci_ai"`) are accepted and no-op'd
//! rather than rejected, so host startup code that registers them
//! unconditionally doesn't see a spurious error. Non-redirected handles
//! forward to the shadow library unchanged, since those databases must
//! behave exactly as SQLiteLib would (spec.md §1).

use super::catch_ffi;
use crate::registry;
use pg_shim_sys::{sqlite3, SQLITE_OK};
use std::os::raw::{c_char, c_int, c_void};

#[no_mangle]
pub unsafe extern "C" fn sqlite3_create_collation(
    db: *mut sqlite3,
    name: *const c_char,
    encoding: c_int,
    arg: *mut c_void,
    compare: Option<extern "C" fn(*mut c_void, c_int, *const c_void, c_int, *const c_void) -> c_int>,
) -> c_int {
    catch_ffi(|| {
        if registry::lookup_connection(db).is_some() {
            return SQLITE_OK;
        }
        pg_shim_sys::sqlite3_create_collation(db, name, encoding, arg, compare)
    })
}

#[no_mangle]
pub unsafe extern "C" fn sqlite3_create_collation_v2(
    db: *mut sqlite3,
    name: *const c_char,
    encoding: c_int,
    arg: *mut c_void,
    compare: Option<extern "C" fn(*mut c_void, c_int, *const c_void, c_int, *const c_void) -> c_int>,
    destroy: Option<extern "C" fn(*mut c_void)>,
) -> c_int {
    catch_ffi(|| {
        if registry::lookup_connection(db).is_some() {
            // The host still owns `arg`'s lifetime contract via `destroy`
            // under real SQLite; since we never call `compare`, invoke
            // `destroy` immediately so the host doesn't leak it waiting
            // for a teardown that will never come.
            if let (Some(destroy), false) = (destroy, arg.is_null()) {
                destroy(arg);
            }
            return SQLITE_OK;
        }
        pg_shim_sys::sqlite3_create_collation_v2(db, name, encoding, arg, compare, destroy)
    })
}
