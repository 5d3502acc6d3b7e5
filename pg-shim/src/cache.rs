//! Per-connection prepared-statement cache (spec.md §4.6).
//!
//! Grounded on the teacher's own `StatementCache` (`cache.rs`), adapted from
//! an LRU over raw SQLite statement handles to an LRU over
//! [`postgres::Statement`] handles keyed by the translated SQL's hash. The
//! teacher's snapshot references the `lru_cache` crate even though its own
//! manifest lists `hashlink`; this cache follows the manifest, not the stale
//! reference.

use hashlink::LruCache;
use postgres::Statement;

/// Default capacity, matching the order of magnitude of the teacher's own
/// default (rusqlite's `StatementCache` defaults to 16 entries).
const DEFAULT_CAPACITY: usize = 64;

pub struct CachedStmt {
    pub stmt: Statement,
    pub param_count: usize,
}

/// `sql_hash -> (server_stmt_name-equivalent handle, param_count)`.
///
/// The spec names a textual `PREPARE <name> AS ...` / `EXECUTE <name>`
/// pair; the `postgres` crate's extended-query protocol already assigns
/// and tracks a server-side statement handle per [`Client::prepare`] call,
/// so this cache stores that handle directly instead of a bare name string
/// — functionally the same reuse contract, one less indirection.
pub struct PreparedCache {
    entries: LruCache<u64, CachedStmt>,
}

impl PreparedCache {
    pub fn new() -> Self {
        PreparedCache {
            entries: LruCache::new(DEFAULT_CAPACITY),
        }
    }

    pub fn get(&mut self, sql_hash: u64) -> Option<&CachedStmt> {
        self.entries.get(&sql_hash)
    }

    pub fn insert(&mut self, sql_hash: u64, stmt: Statement, param_count: usize) {
        self.entries.insert(sql_hash, CachedStmt { stmt, param_count });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for PreparedCache {
    fn default() -> Self {
        Self::new()
    }
}
