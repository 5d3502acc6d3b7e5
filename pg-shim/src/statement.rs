//! Statement object and lifecycle engine (spec.md §3 "Statement object",
//! §4.4 "Statement Engine").
//!
//! Grounded on the teacher's `Statement`/`RawStatement` split
//! (`statement.rs`, `raw_statement.rs`): one owning struct carries
//! everything needed to answer the host's bind/step/column calls, guarded
//! by a single mutex the registries wrap it in.

use crate::cache::CachedStmt;
use crate::classifier::Kind;
use crate::config::Config;
use crate::connection::Connection;
use crate::decltype;
use crate::error::{ShimError, ShimResult};
use crate::fakevalue::FakeValuePool;
use crate::lastgen;
use crate::result::{cell_blob, cell_double, cell_int, cell_text, column_meta_from_columns, BlobCache, ColumnMeta, SqliteType, TextPool};
use crate::sql_hash::{hash_sql, stmt_name};
use crate::translator::{translate, Translated};
use crate::upsert::WritePolicy;
use crate::value::{ParamValue, MIN_PARAM_SLOTS};
use postgres::Row;
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Write,
    Read,
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Row,
    Done,
}

pub struct Statement {
    pub connection: Arc<Connection>,
    pub original_sql: String,
    pub translated_sql: String,
    pub param_names: Vec<Option<String>>,
    param_count: usize,
    pub role: Role,
    pub write_executed: bool,
    pub stmt_name: String,
    pub sql_hash: u64,

    params: Vec<ParamValue>,

    rows: Option<Vec<Row>>,
    current_row: i64,
    column_meta: Vec<ColumnMeta>,
    columns_known: bool,

    blob_cache: BlobCache,
    text_pool: TextPool,
    pub fake_values: FakeValuePool,

    last_changes: i64,
    last_insert_rowid: i64,
}

impl Statement {
    /// Prepare-time construction (spec.md §4.4 "Prepare"): classify,
    /// translate, compute the cache key, and apply the handful of
    /// prepare-time rewrites (generator-id substitution, settings upsert,
    /// then `RETURNING id` injection — upsert must run before `RETURNING`
    /// is appended since Postgres requires `ON CONFLICT` to precede
    /// `RETURNING` in an `INSERT`).
    pub fn prepare(
        connection: Arc<Connection>,
        original_sql: &str,
        kind: Kind,
        skip: bool,
        upsert_policy: Option<&dyn WritePolicy>,
        generator_entity_hint: Option<&str>,
    ) -> ShimResult<Self> {
        let role = if skip {
            Role::Skip
        } else {
            match kind {
                Kind::Read => Role::Read,
                Kind::Write => Role::Write,
                Kind::Other => Role::Skip,
            }
        };

        if role == Role::Skip {
            return Ok(Statement::new_skip(connection, original_sql));
        }

        let Translated {
            sql,
            param_names,
            param_count,
        } = translate(original_sql).map_err(|e| ShimError::TranslationFailure(e.message))?;

        let mut sql = sql;
        if let Some(hint) = generator_entity_hint {
            sql = lastgen::substitute_in_null(&sql, hint);
        }

        if role == Role::Write {
            if let Some(policy) = upsert_policy {
                if let Some(rewritten) = policy.rewrite(&sql) {
                    sql = rewritten;
                }
            }
            if !sql.to_ascii_lowercase().contains("returning") {
                sql = format!("{sql} RETURNING id");
            }
        }

        let sql_hash = hash_sql(&sql);
        let name = stmt_name(sql_hash);
        let slot_count = MIN_PARAM_SLOTS.max(param_count);
        let params = vec![ParamValue::Null; slot_count];

        Ok(Statement {
            connection,
            original_sql: original_sql.to_string(),
            translated_sql: sql,
            param_names,
            param_count,
            role,
            write_executed: false,
            stmt_name: name,
            sql_hash,
            params,
            rows: None,
            current_row: -1,
            column_meta: Vec::new(),
            columns_known: false,
            blob_cache: BlobCache::default(),
            text_pool: TextPool::new(),
            fake_values: FakeValuePool::new(),
            last_changes: 0,
            last_insert_rowid: 0,
        })
    }

    fn new_skip(connection: Arc<Connection>, original_sql: &str) -> Self {
        Statement {
            connection,
            original_sql: original_sql.to_string(),
            translated_sql: String::new(),
            param_names: Vec::new(),
            param_count: 0,
            role: Role::Skip,
            write_executed: false,
            stmt_name: String::new(),
            sql_hash: 0,
            params: vec![ParamValue::Null; MIN_PARAM_SLOTS],
            rows: None,
            current_row: -1,
            column_meta: Vec::new(),
            columns_known: true,
            blob_cache: BlobCache::default(),
            text_pool: TextPool::new(),
            fake_values: FakeValuePool::new(),
            last_changes: 0,
            last_insert_rowid: 0,
        }
    }

    pub fn param_count(&self) -> usize {
        self.param_count
    }

    fn ensure_slot(&mut self, idx: usize) {
        if idx >= self.params.len() {
            self.params.resize(idx + 1, ParamValue::Null);
        }
    }

    pub fn bind(&mut self, idx: usize, value: ParamValue) -> ShimResult<()> {
        if idx == 0 {
            return Err(ShimError::BadInput("parameter index is 1-based"));
        }
        self.ensure_slot(idx - 1);
        self.params[idx - 1] = value;
        Ok(())
    }

    pub fn bind_name_index(&self, name: &str) -> Option<usize> {
        self.param_names
            .iter()
            .position(|n| n.as_deref() == Some(name))
            .map(|i| i + 1)
    }

    pub fn clear_bindings(&mut self) {
        for slot in &mut self.params {
            *slot = ParamValue::Null;
        }
    }

    pub fn current_row(&self) -> i64 {
        self.current_row
    }

    pub fn num_rows(&self) -> i64 {
        self.rows.as_ref().map(|r| r.len() as i64).unwrap_or(0)
    }

    pub fn num_cols(&self) -> usize {
        self.column_meta.len()
    }

    pub fn column_meta(&self, idx: usize) -> Option<&ColumnMeta> {
        self.column_meta.get(idx)
    }

    pub fn last_changes(&self) -> i64 {
        self.last_changes
    }

    pub fn last_insert_rowid(&self) -> i64 {
        self.last_insert_rowid
    }

    /// Step the statement (spec.md §4.4 "Step").
    pub fn step(&mut self, cfg: &Config) -> ShimResult<StepOutcome> {
        match self.role {
            Role::Skip => Ok(StepOutcome::Done),
            Role::Write => self.step_write(cfg),
            Role::Read => self.step_read(cfg),
        }
    }

    fn step_write(&mut self, cfg: &Config) -> ShimResult<StepOutcome> {
        if self.write_executed {
            return Ok(StepOutcome::Done);
        }
        let sql = self.translated_sql.clone();
        let params = self.params.clone();
        let connection = self.connection.clone();

        let outcome = connection.with_channel(cfg, |handle| {
            let cached = handle.cache.get(self.sql_hash).map(|c: &CachedStmt| c.stmt.clone());
            let stmt = match cached {
                Some(stmt) => stmt,
                None => {
                    let stmt = handle.channel.prepare(&sql)?;
                    handle.cache.insert(self.sql_hash, stmt.clone(), params.len());
                    stmt
                }
            };
            if !self.columns_known {
                let decltypes = decltype::table_hint(&sql)
                    .map(|t| decltype::decltypes_for_table(&mut handle.channel, &cfg.schema, &t))
                    .unwrap_or_default();
                self.column_meta = column_meta_from_columns(stmt.columns(), &decltypes);
                self.columns_known = true;
            }
            match handle.channel.query(&stmt, &params) {
                Ok(rows) => Ok(rows),
                Err(e) => {
                    error!(sql = %sql, error = %e, "write failed on server, surfacing as no-op success");
                    Ok(Vec::new())
                }
            }
        });

        let rows = match outcome {
            Ok(rows) => rows,
            Err(ShimError::ConnectionFailure(msg)) => {
                warn!(error = %msg, "connection failure during write, step returns done");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        self.last_changes = rows.len() as i64;
        self.connection.set_last_changes(self.last_changes);
        if let Some(first) = rows.first() {
            if let Some(id) = first
                .columns()
                .iter()
                .position(|c| c.name() == "id")
                .and_then(|idx| cell_text_as_i64(first, idx))
            {
                self.last_insert_rowid = id;
                self.connection.set_last_insert_rowid(id);
                lastgen::capture_from_insert_sql(&self.original_sql);
            } else if let Ok(id) = self.connection.with_channel(cfg, |h| h.channel.lastval()) {
                self.last_insert_rowid = id;
                self.connection.set_last_insert_rowid(id);
            }
        }
        self.write_executed = true;
        Ok(StepOutcome::Done)
    }

    fn step_read(&mut self, cfg: &Config) -> ShimResult<StepOutcome> {
        if self.rows.is_none() {
            let sql = self.translated_sql.clone();
            let params = self.params.clone();
            let connection = self.connection.clone();

            let rows = connection.with_channel(cfg, |handle| {
                let cached = handle.cache.get(self.sql_hash).map(|c: &CachedStmt| c.stmt.clone());
                let stmt = match cached {
                    Some(stmt) => stmt,
                    None => {
                        let stmt = handle.channel.prepare(&sql)?;
                        handle.cache.insert(self.sql_hash, stmt.clone(), params.len());
                        stmt
                    }
                };
                if !self.columns_known {
                    let decltypes = decltype::table_hint(&sql)
                        .map(|t| decltype::decltypes_for_table(&mut handle.channel, &cfg.schema, &t))
                        .unwrap_or_default();
                    self.column_meta = column_meta_from_columns(stmt.columns(), &decltypes);
                    self.columns_known = true;
                }
                handle.channel.query(&stmt, &params)
            });

            let rows = match rows {
                Ok(rows) => rows,
                Err(ShimError::ServerExecFailure(msg)) => {
                    warn!(error = %msg, "read failed on server, returning done");
                    self.rows = None;
                    return Ok(StepOutcome::Done);
                }
                Err(e) => return Err(e),
            };

            let empty = rows.is_empty();
            self.rows = Some(rows);
            self.current_row = 0;
            self.blob_cache.invalidate();
            return Ok(if empty { StepOutcome::Done } else { StepOutcome::Row });
        }

        self.current_row += 1;
        let len = self.rows.as_ref().map(|r| r.len() as i64).unwrap_or(0);
        if self.current_row >= len {
            // Release eagerly so a host that forgets to reset doesn't pin
            // the result set in memory indefinitely (spec.md §4.4).
            self.rows = None;
            self.current_row = -1;
            Ok(StepOutcome::Done)
        } else {
            Ok(StepOutcome::Row)
        }
    }

    pub fn reset(&mut self) {
        self.clear_bindings();
        self.rows = None;
        self.current_row = -1;
        self.write_executed = false;
        self.blob_cache.invalidate();
    }

    fn current_row_ref(&self) -> Option<&Row> {
        if self.current_row < 0 {
            return None;
        }
        self.rows.as_ref().and_then(|r| r.get(self.current_row as usize))
    }

    pub fn column_int(&mut self, idx: usize) -> i64 {
        match self.current_row_ref() {
            Some(row) if idx < row.len() => cell_int(row, idx),
            _ => 0,
        }
    }

    pub fn column_double(&mut self, idx: usize) -> f64 {
        match self.current_row_ref() {
            Some(row) if idx < row.len() => cell_double(row, idx),
            _ => 0.0,
        }
    }

    pub fn column_type(&self, idx: usize) -> SqliteType {
        match self.current_row_ref() {
            Some(row) if idx < row.len() => {
                if cell_text(row, idx).is_none() {
                    SqliteType::Null
                } else {
                    self.column_meta
                        .get(idx)
                        .map(|m| m.sqlite_type)
                        .unwrap_or(SqliteType::Text)
                }
            }
            _ => SqliteType::Null,
        }
    }

    /// Returns a `(ptr, len)` pair valid until this statement's ring slot
    /// recycles (spec.md §4.5, with the per-statement-pool deviation noted
    /// at the top of `result.rs`).
    pub fn column_text(&mut self, idx: usize) -> (*const u8, i32) {
        let row = match self.current_row_ref() {
            Some(r) if idx < r.len() => r,
            _ => return (std::ptr::null(), 0),
        };
        let text = cell_text_owned(row, idx).unwrap_or_default();
        self.text_pool.store(text.as_bytes())
    }

    /// Backing for `column_decltype` (spec.md §4.5): the preloaded
    /// declared-type side lookup, falling back to `None` (the FFI layer
    /// then falls through to the shadow statement's own decltype) when no
    /// metadata row exists for this column.
    pub fn column_decltype(&mut self, idx: usize) -> (*const u8, i32) {
        match self.column_meta.get(idx).and_then(|m| m.decltype.clone()) {
            Some(decl) => self.text_pool.store(decl.as_bytes()),
            None => (std::ptr::null(), 0),
        }
    }

    pub fn column_name(&mut self, idx: usize) -> (*const u8, i32) {
        match self.column_meta.get(idx) {
            Some(meta) => self.text_pool.store(meta.name.as_bytes()),
            None => (std::ptr::null(), 0),
        }
    }

    /// Claim a fake-value record for `column_value`/`value_*` (spec.md §3
    /// "Fake-value object" / §4.5 "Column-value").
    pub fn claim_fake_value(&mut self, stmt_ptr: *mut pg_shim_sys::sqlite3_stmt, idx: usize) -> *mut pg_shim_sys::sqlite3_value {
        let row = self.current_row;
        self.fake_values.claim(stmt_ptr, idx, row)
    }

    pub fn column_blob(&mut self, idx: usize) -> (*const u8, i32) {
        let is_bytea = self
            .column_meta
            .get(idx)
            .map(|m| m.sqlite_type == SqliteType::Blob)
            .unwrap_or(false);
        let (row, current_row) = match self.current_row_ref() {
            Some(r) if idx < r.len() => (r, self.current_row),
            _ => return (std::ptr::null(), 0),
        };
        let bytes = cell_blob(row, idx, is_bytea);
        let decoded = self.blob_cache.get_or_decode(current_row, idx, || bytes);
        self.text_pool.store(&decoded)
    }
}

fn cell_text_owned(row: &Row, idx: usize) -> Option<String> {
    cell_text(row, idx)
}

fn cell_text_as_i64(row: &Row, idx: usize) -> Option<i64> {
    cell_text_owned(row, idx).and_then(|s| s.parse::<i64>().ok())
}
