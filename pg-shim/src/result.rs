//! Result Adapter (spec.md §4.5): column metadata/type mapping, text and
//! blob pointer pools, and the declared-type side lookup.
//!
//! The spec's C original uses a process-global round-robin buffer pool so a
//! returned pointer survives until ~256 further column reads recycle the
//! slot. Per spec.md §9's own redesign note, this adapter instead scopes
//! the pool to the owning statement: the pointer is still valid for the
//! statement's remaining lifetime, the memory is freed deterministically on
//! finalize, and no cross-statement contention is possible. Documented as a
//! deliberate deviation, not an oversight, in the project's design notes.

use crate::value::{coerce_bool_text, decode_bytea_hex, hex_encode_bytea, SqliteType};
use parking_lot::Mutex;
use postgres::types::Type;
use postgres::{Column, Row};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Number of scratch buffers kept per statement for text/blob accessor
/// return pointers. Small because lifetimes are statement-scoped, unlike
/// the original's 256-entry process-global pools.
const RING_CAPACITY: usize = 16;

pub struct TextPool {
    buffers: Vec<Vec<u8>>,
    next: usize,
}

impl TextPool {
    pub fn new() -> Self {
        TextPool {
            buffers: (0..RING_CAPACITY).map(|_| Vec::new()).collect(),
            next: 0,
        }
    }

    /// Copy `bytes` into the next ring slot, NUL-terminate, and return a
    /// pointer valid until this same slot is recycled.
    pub fn store(&mut self, bytes: &[u8]) -> (*const u8, i32) {
        let idx = self.next;
        self.next = (self.next + 1) % self.buffers.len();
        let buf = &mut self.buffers[idx];
        buf.clear();
        buf.reserve(bytes.len() + 1);
        buf.extend_from_slice(bytes);
        buf.push(0);
        (buf.as_ptr(), bytes.len() as i32)
    }
}

impl Default for TextPool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct ColumnMeta {
    pub name: String,
    pub sqlite_type: SqliteType,
    pub decltype: Option<String>,
}

/// Fixed OID-family mapping from spec.md §4.5.
pub fn sqlite_type_for(pg_type: &Type) -> SqliteType {
    match *pg_type {
        Type::BOOL | Type::INT2 | Type::INT4 | Type::INT8 => SqliteType::Integer,
        Type::FLOAT4 | Type::FLOAT8 | Type::NUMERIC => SqliteType::Float,
        Type::BYTEA => SqliteType::Blob,
        _ => SqliteType::Text,
    }
}

/// Built from the prepared statement's own column shape, available
/// immediately after `PREPARE` and independent of whether the query has
/// ever produced a row (spec.md §8 scenario 4: `column_count` is 1 even
/// when the result has zero rows).
pub fn column_meta_from_columns(columns: &[Column], decltypes: &HashMap<String, String>) -> Vec<ColumnMeta> {
    columns
        .iter()
        .map(|c| ColumnMeta {
            name: c.name().to_string(),
            sqlite_type: sqlite_type_for(c.type_()),
            decltype: decltypes.get(c.name()).cloned(),
        })
        .collect()
}

/// Text rendering of a single cell, used by every numeric/text accessor
/// before type coercion (spec.md §4.5: "fetch the row-column text").
///
/// `postgres`'s extended-query path always requests binary-format results
/// (there is no per-column text opt-in on the client side), so a generic
/// `String` fetch only succeeds for already-textual columns; every other
/// OID family is decoded through its own binary `FromSql` implementation
/// and re-rendered here into the same textual shape the server's libpq
/// text protocol would have produced (`'t'`/`'f'` for bool, plain decimal
/// for numbers, `\x`-prefixed hex for bytea) so the rest of the adapter
/// (`coerce_bool_text`, `decode_bytea_hex`) can stay written against that
/// textual contract exactly as spec.md §4.5 describes it.
pub fn cell_text(row: &Row, col: usize) -> Option<String> {
    match *row.columns()[col].type_() {
        Type::BOOL => row
            .try_get::<usize, Option<bool>>(col)
            .ok()
            .flatten()
            .map(|b| if b { "t".to_string() } else { "f".to_string() }),
        Type::INT2 => row.try_get::<usize, Option<i16>>(col).ok().flatten().map(|v| v.to_string()),
        Type::INT4 => row.try_get::<usize, Option<i32>>(col).ok().flatten().map(|v| v.to_string()),
        Type::INT8 => row.try_get::<usize, Option<i64>>(col).ok().flatten().map(|v| v.to_string()),
        Type::FLOAT4 => row.try_get::<usize, Option<f32>>(col).ok().flatten().map(|v| v.to_string()),
        Type::FLOAT8 => row.try_get::<usize, Option<f64>>(col).ok().flatten().map(|v| v.to_string()),
        Type::NUMERIC => row
            .try_get::<usize, Option<Decimal>>(col)
            .ok()
            .flatten()
            .map(|v| v.to_string()),
        Type::BYTEA => row
            .try_get::<usize, Option<Vec<u8>>>(col)
            .ok()
            .flatten()
            .map(|b| hex_encode_bytea(&b)),
        _ => row.try_get::<usize, Option<String>>(col).ok().flatten(),
    }
}

pub fn cell_int(row: &Row, col: usize) -> i64 {
    match cell_text(row, col) {
        None => 0,
        // Try an exact integer parse before falling back through float
        // truncation, so a full-width `bind_int64`/`column_int64` round
        // trip (spec.md §8) doesn't lose precision above 2^53 the way a
        // float-only parse would.
        Some(t) => coerce_bool_text(&t)
            .or_else(|| t.parse::<i64>().ok())
            .unwrap_or_else(|| t.parse::<f64>().unwrap_or(0.0) as i64),
    }
}

pub fn cell_double(row: &Row, col: usize) -> f64 {
    match cell_text(row, col) {
        None => 0.0,
        Some(t) => match coerce_bool_text(&t) {
            Some(i) => i as f64,
            None => t.parse::<f64>().unwrap_or(0.0),
        },
    }
}

pub fn cell_blob(row: &Row, col: usize, is_bytea: bool) -> Vec<u8> {
    match cell_text(row, col) {
        None => Vec::new(),
        Some(t) if is_bytea => decode_bytea_hex(&t),
        Some(t) => t.into_bytes(),
    }
}

/// Per-statement, per-row decoded-blob cache (spec.md §3 "decoded-blob
/// cache keyed by current row").
#[derive(Default)]
pub struct BlobCache {
    row: i64,
    entries: Mutex<HashMap<usize, Vec<u8>>>,
}

impl BlobCache {
    pub fn get_or_decode(&mut self, row: i64, col: usize, decode: impl FnOnce() -> Vec<u8>) -> Vec<u8> {
        if row != self.row {
            self.entries.lock().clear();
            self.row = row;
        }
        let mut entries = self.entries.lock();
        entries.entry(col).or_insert_with(decode).clone()
    }

    pub fn invalidate(&mut self) {
        self.entries.lock().clear();
        self.row = -1;
    }
}
