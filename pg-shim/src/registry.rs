//! Global connection and statement registries (spec.md §3 invariants,
//! §5 lock ordering: registry mutexes are acquired first and held only
//! for map mutation).

use crate::connection::Connection;
use crate::statement::Statement;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use pg_shim_sys::{sqlite3, sqlite3_stmt};
use std::collections::HashMap;
use std::sync::Arc;

type ConnKey = usize;
type StmtKey = usize;

fn conn_key(db: *mut sqlite3) -> ConnKey {
    db as usize
}

fn stmt_key(stmt: *mut sqlite3_stmt) -> StmtKey {
    stmt as usize
}

static CONNECTIONS: Lazy<Mutex<HashMap<ConnKey, Arc<Connection>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Global shim-prepared statement registry (spec.md §4.4). Statements
/// discovered pre-existing at first `step` live in a separate per-thread
/// registry (see [`crate::precached`]) so concurrent steps on different
/// threads never contend on this map.
static STATEMENTS: Lazy<Mutex<HashMap<StmtKey, Arc<Mutex<Statement>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub fn register_connection(db: *mut sqlite3, conn: Connection) -> Arc<Connection> {
    let arc = Arc::new(conn);
    CONNECTIONS.lock().insert(conn_key(db), arc.clone());
    arc
}

pub fn lookup_connection(db: *mut sqlite3) -> Option<Arc<Connection>> {
    CONNECTIONS.lock().get(&conn_key(db)).cloned()
}

pub fn remove_connection(db: *mut sqlite3) -> Option<Arc<Connection>> {
    CONNECTIONS.lock().remove(&conn_key(db))
}

/// Register a newly shim-prepared statement. Returns `Err` if this pointer
/// is already registered (spec.md §3: "double-registration is an error").
pub fn register_statement(
    stmt: *mut sqlite3_stmt,
    obj: Statement,
) -> Result<Arc<Mutex<Statement>>, ()> {
    let mut guard = STATEMENTS.lock();
    if guard.contains_key(&stmt_key(stmt)) {
        return Err(());
    }
    let arc = Arc::new(Mutex::new(obj));
    guard.insert(stmt_key(stmt), arc.clone());
    Ok(arc)
}

pub fn lookup_statement(stmt: *mut sqlite3_stmt) -> Option<Arc<Mutex<Statement>>> {
    STATEMENTS.lock().get(&stmt_key(stmt)).cloned()
}

pub fn remove_statement(stmt: *mut sqlite3_stmt) -> Option<Arc<Mutex<Statement>>> {
    STATEMENTS.lock().remove(&stmt_key(stmt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Kind;
    use crate::config::Config;

    fn test_config() -> Config {
        Config {
            host: "localhost".into(),
            port: 5432,
            database: "plex".into(),
            user: "plex".into(),
            password: "".into(),
            schema: "plex".into(),
            redirect_patterns: vec!["plex".into()],
            pool_patterns: vec!["plex".into()],
            log_path: "/tmp/pg-shim-test.log".into(),
            connect_timeout_secs: 5,
        }
    }

    /// `pooled = true` never opens a physical channel at open time (spec.md
    /// §4.3: a pool channel is acquired lazily on first use by a thread),
    /// so this is exercisable without a live server.
    fn test_connection() -> Arc<Connection> {
        Arc::new(Connection::open("plex.db", true, &test_config()).unwrap())
    }

    #[test]
    fn connection_round_trips_through_registry() {
        let db = 0x1000 as *mut sqlite3;
        let conn = Connection::open("plex.db", true, &test_config()).unwrap();
        let arc = register_connection(db, conn);
        assert!(Arc::ptr_eq(&arc, &lookup_connection(db).unwrap()));
        assert!(remove_connection(db).is_some());
        assert!(lookup_connection(db).is_none());
    }

    #[test]
    fn double_registration_of_same_statement_pointer_is_rejected() {
        let stmt_ptr = 0x2000 as *mut sqlite3_stmt;
        let conn = test_connection();
        let obj1 = Statement::prepare(conn.clone(), "PRAGMA journal_mode=WAL", Kind::Other, true, None, None).unwrap();
        let obj2 = Statement::prepare(conn, "PRAGMA journal_mode=WAL", Kind::Other, true, None, None).unwrap();

        assert!(register_statement(stmt_ptr, obj1).is_ok());
        assert!(register_statement(stmt_ptr, obj2).is_err(), "spec.md §3: double-registration is an error");

        assert!(remove_statement(stmt_ptr).is_some());
        assert!(lookup_statement(stmt_ptr).is_none());
    }
}
