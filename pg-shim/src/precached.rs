//! Per-thread registry for statements prepared before the shim got a
//! chance to see them (spec.md §3, §4.4: "Per-thread cached-pre-existing
//! registry"). Kept separate from [`crate::registry`]'s global table and
//! thread-local because such statements may be stepped concurrently from
//! several threads at once — each thread discovers and owns its own copy.

use crate::statement::Statement;
use parking_lot::Mutex;
use pg_shim_sys::sqlite3_stmt;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

thread_local! {
    static PRECACHED: RefCell<HashMap<usize, Arc<Mutex<Statement>>>> = RefCell::new(HashMap::new());
}

pub fn lookup(stmt: *mut sqlite3_stmt) -> Option<Arc<Mutex<Statement>>> {
    PRECACHED.with(|m| m.borrow().get(&(stmt as usize)).cloned())
}

/// Insert on first redirected `step` of a statement the shim never saw
/// `prepare` for.
pub fn insert(stmt: *mut sqlite3_stmt, obj: Statement) -> Arc<Mutex<Statement>> {
    let arc = Arc::new(Mutex::new(obj));
    PRECACHED.with(|m| {
        m.borrow_mut().insert(stmt as usize, arc.clone());
    });
    arc
}

pub fn remove(stmt: *mut sqlite3_stmt) -> Option<Arc<Mutex<Statement>>> {
    PRECACHED.with(|m| m.borrow_mut().remove(&(stmt as usize)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Kind;
    use crate::config::Config;
    use crate::connection::Connection;

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

    fn skip_statement() -> Statement {
        let conn = Arc::new(Connection::open("plex.db", true, &test_config()).unwrap());
        Statement::prepare(conn, "PRAGMA journal_mode=WAL", Kind::Other, true, None, None).unwrap()
    }

    #[test]
    fn insert_lookup_remove_round_trip() {
        let stmt = 0x3000 as *mut sqlite3_stmt;
        assert!(lookup(stmt).is_none());

        insert(stmt, skip_statement());
        assert!(lookup(stmt).is_some());

        assert!(remove(stmt).is_some());
        assert!(lookup(stmt).is_none());
    }

    #[test]
    fn registry_is_thread_local() {
        let stmt = 0x3001 as *mut sqlite3_stmt;
        insert(stmt, skip_statement());
        assert!(lookup(stmt).is_some());

        std::thread::spawn(move || {
            assert!(lookup(stmt).is_none(), "precached statements must not leak across threads");
        })
        .join()
        .unwrap();

        assert!(remove(stmt).is_some());
    }
}
