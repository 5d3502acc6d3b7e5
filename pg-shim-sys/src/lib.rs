//! Opaque types, return/type codes, and extern declarations for the
//! embedded-database C ABI.
//!
//! This crate does not implement the embedded database. Like
//! `libsqlite3-sys` wraps a system or bundled `libsqlite3.so` without
//! reimplementing it, this crate only declares the shape of the shadow
//! library's entry points; the host process supplies the actual symbols by
//! linking the real library. The shim calls through these declarations for
//! two purposes: passthrough on non-redirected databases, and maintaining a
//! shadow handle/statement so the host's opaque-pointer and parser-state
//! expectations keep working on redirected ones.

#![allow(non_camel_case_types)]

use libc::{c_char, c_int, c_void};

#[repr(C)]
pub struct sqlite3 {
    _private: [u8; 0],
}

#[repr(C)]
pub struct sqlite3_stmt {
    _private: [u8; 0],
}

#[repr(C)]
pub struct sqlite3_value {
    _private: [u8; 0],
}

#[repr(C)]
pub struct sqlite3_context {
    _private: [u8; 0],
}

pub type sqlite3_int64 = i64;
pub type sqlite3_uint64 = u64;
pub type sqlite3_destructor_type = Option<extern "C" fn(*mut c_void)>;

// Result codes, cf. <https://sqlite.org/rescode.html>.
pub const SQLITE_OK: c_int = 0;
pub const SQLITE_ERROR: c_int = 1;
pub const SQLITE_BUSY: c_int = 5;
pub const SQLITE_NOMEM: c_int = 7;
pub const SQLITE_MISUSE: c_int = 21;
pub const SQLITE_RANGE: c_int = 25;
pub const SQLITE_ROW: c_int = 100;
pub const SQLITE_DONE: c_int = 101;

// Fundamental datatypes, cf. <https://sqlite.org/c3ref/c_blob.html>.
pub const SQLITE_INTEGER: c_int = 1;
pub const SQLITE_FLOAT: c_int = 2;
pub const SQLITE_TEXT: c_int = 3;
pub const SQLITE_BLOB: c_int = 4;
pub const SQLITE_NULL: c_int = 5;

// sqlite3_open_v2 flags actually consulted by the shim.
pub const SQLITE_OPEN_READONLY: c_int = 0x0000_0001;
pub const SQLITE_OPEN_READWRITE: c_int = 0x0000_0002;
pub const SQLITE_OPEN_CREATE: c_int = 0x0000_0004;

pub fn sqlite_static_destructor() -> sqlite3_destructor_type {
    // SQLITE_STATIC: tells the real library the pointer outlives the call.
    unsafe { std::mem::transmute(0isize) }
}

pub fn sqlite_transient_destructor() -> sqlite3_destructor_type {
    // SQLITE_TRANSIENT: tells the real library to copy the pointer's bytes.
    unsafe { std::mem::transmute(-1isize) }
}

extern "C" {
    pub fn sqlite3_open_v2(
        filename: *const c_char,
        ppdb: *mut *mut sqlite3,
        flags: c_int,
        vfs: *const c_char,
    ) -> c_int;
    pub fn sqlite3_close(db: *mut sqlite3) -> c_int;
    pub fn sqlite3_errmsg(db: *mut sqlite3) -> *const c_char;
    pub fn sqlite3_errcode(db: *mut sqlite3) -> c_int;

    pub fn sqlite3_prepare_v2(
        db: *mut sqlite3,
        sql: *const c_char,
        n_byte: c_int,
        pp_stmt: *mut *mut sqlite3_stmt,
        pz_tail: *mut *const c_char,
    ) -> c_int;
    pub fn sqlite3_prepare16_v2(
        db: *mut sqlite3,
        sql: *const c_void,
        n_byte: c_int,
        pp_stmt: *mut *mut sqlite3_stmt,
        pz_tail: *mut *const c_void,
    ) -> c_int;
    pub fn sqlite3_finalize(stmt: *mut sqlite3_stmt) -> c_int;
    pub fn sqlite3_step(stmt: *mut sqlite3_stmt) -> c_int;
    pub fn sqlite3_reset(stmt: *mut sqlite3_stmt) -> c_int;
    pub fn sqlite3_sql(stmt: *mut sqlite3_stmt) -> *const c_char;
    /// Recovers the `sqlite3*` handle a statement was prepared against.
    /// Used to discover which `Connection` (if any) owns a statement the
    /// shim never saw `prepare` for (spec.md §3/§4.4 "cached-pre-existing
    /// registry").
    pub fn sqlite3_db_handle(stmt: *mut sqlite3_stmt) -> *mut sqlite3;
    pub fn sqlite3_bind_parameter_count(stmt: *mut sqlite3_stmt) -> c_int;
    pub fn sqlite3_bind_parameter_name(stmt: *mut sqlite3_stmt, idx: c_int) -> *const c_char;

    pub fn sqlite3_libversion() -> *const c_char;

    pub fn sqlite3_bind_parameter_index(stmt: *mut sqlite3_stmt, name: *const c_char) -> c_int;
    pub fn sqlite3_bind_int(stmt: *mut sqlite3_stmt, idx: c_int, value: c_int) -> c_int;
    pub fn sqlite3_bind_int64(stmt: *mut sqlite3_stmt, idx: c_int, value: sqlite3_int64) -> c_int;
    pub fn sqlite3_bind_double(stmt: *mut sqlite3_stmt, idx: c_int, value: f64) -> c_int;
    pub fn sqlite3_bind_null(stmt: *mut sqlite3_stmt, idx: c_int) -> c_int;
    pub fn sqlite3_bind_text(
        stmt: *mut sqlite3_stmt,
        idx: c_int,
        text: *const c_char,
        n: c_int,
        destructor: sqlite3_destructor_type,
    ) -> c_int;
    pub fn sqlite3_bind_text64(
        stmt: *mut sqlite3_stmt,
        idx: c_int,
        text: *const c_char,
        n: sqlite3_uint64,
        destructor: sqlite3_destructor_type,
        encoding: libc::c_uchar,
    ) -> c_int;
    pub fn sqlite3_bind_blob(
        stmt: *mut sqlite3_stmt,
        idx: c_int,
        data: *const c_void,
        n: c_int,
        destructor: sqlite3_destructor_type,
    ) -> c_int;
    pub fn sqlite3_bind_blob64(
        stmt: *mut sqlite3_stmt,
        idx: c_int,
        data: *const c_void,
        n: sqlite3_uint64,
        destructor: sqlite3_destructor_type,
    ) -> c_int;
    pub fn sqlite3_bind_value(stmt: *mut sqlite3_stmt, idx: c_int, value: *const sqlite3_value) -> c_int;
    pub fn sqlite3_clear_bindings(stmt: *mut sqlite3_stmt) -> c_int;

    pub fn sqlite3_column_count(stmt: *mut sqlite3_stmt) -> c_int;
    pub fn sqlite3_data_count(stmt: *mut sqlite3_stmt) -> c_int;
    pub fn sqlite3_column_type(stmt: *mut sqlite3_stmt, col: c_int) -> c_int;
    pub fn sqlite3_column_name(stmt: *mut sqlite3_stmt, col: c_int) -> *const c_char;
    pub fn sqlite3_column_decltype(stmt: *mut sqlite3_stmt, col: c_int) -> *const c_char;
    pub fn sqlite3_column_int(stmt: *mut sqlite3_stmt, col: c_int) -> c_int;
    pub fn sqlite3_column_int64(stmt: *mut sqlite3_stmt, col: c_int) -> sqlite3_int64;
    pub fn sqlite3_column_double(stmt: *mut sqlite3_stmt, col: c_int) -> f64;
    pub fn sqlite3_column_text(stmt: *mut sqlite3_stmt, col: c_int) -> *const u8;
    pub fn sqlite3_column_bytes(stmt: *mut sqlite3_stmt, col: c_int) -> c_int;
    pub fn sqlite3_column_blob(stmt: *mut sqlite3_stmt, col: c_int) -> *const c_void;
    pub fn sqlite3_column_value(stmt: *mut sqlite3_stmt, col: c_int) -> *mut sqlite3_value;

    pub fn sqlite3_value_type(value: *mut sqlite3_value) -> c_int;
    pub fn sqlite3_value_int(value: *mut sqlite3_value) -> c_int;
    pub fn sqlite3_value_int64(value: *mut sqlite3_value) -> sqlite3_int64;
    pub fn sqlite3_value_double(value: *mut sqlite3_value) -> f64;
    pub fn sqlite3_value_text(value: *mut sqlite3_value) -> *const u8;
    pub fn sqlite3_value_bytes(value: *mut sqlite3_value) -> c_int;
    pub fn sqlite3_value_blob(value: *mut sqlite3_value) -> *const c_void;

    pub fn sqlite3_changes(db: *mut sqlite3) -> c_int;
    pub fn sqlite3_changes64(db: *mut sqlite3) -> sqlite3_int64;
    pub fn sqlite3_last_insert_rowid(db: *mut sqlite3) -> sqlite3_int64;

    pub fn sqlite3_create_collation(
        db: *mut sqlite3,
        name: *const c_char,
        encoding: c_int,
        arg: *mut c_void,
        compare: Option<
            extern "C" fn(*mut c_void, c_int, *const c_void, c_int, *const c_void) -> c_int,
        >,
    ) -> c_int;
    pub fn sqlite3_create_collation_v2(
        db: *mut sqlite3,
        name: *const c_char,
        encoding: c_int,
        arg: *mut c_void,
        compare: Option<
            extern "C" fn(*mut c_void, c_int, *const c_void, c_int, *const c_void) -> c_int,
        >,
        destroy: Option<extern "C" fn(*mut c_void)>,
    ) -> c_int;

    pub fn sqlite3_exec(
        db: *mut sqlite3,
        sql: *const c_char,
        callback: Option<
            extern "C" fn(*mut c_void, c_int, *mut *mut c_char, *mut *mut c_char) -> c_int,
        >,
        arg: *mut c_void,
        errmsg: *mut *mut c_char,
    ) -> c_int;
    pub fn sqlite3_get_table(
        db: *mut sqlite3,
        sql: *const c_char,
        presult: *mut *mut *mut c_char,
        nrow: *mut c_int,
        ncolumn: *mut c_int,
        errmsg: *mut *mut c_char,
    ) -> c_int;

    // The shadow library's own allocator. Memory the shim hands back to the
    // host through entry points it does not itself intercept (`errmsg` out
    // params, `sqlite3_free_table`'s buffer) is allocated through this so
    // the host's later `sqlite3_free`/`sqlite3_free_table` call — which
    // passes straight through to the shadow library untouched — frees it
    // correctly instead of corrupting an allocator it didn't allocate from.
    pub fn sqlite3_malloc(n: c_int) -> *mut c_void;
    pub fn sqlite3_free(ptr: *mut c_void);
}
