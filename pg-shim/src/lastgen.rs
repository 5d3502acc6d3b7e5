//! Process-wide "last generator id" singleton (spec.md §4.4, §9).
//!
//! The C original keeps a single global slot so that a generator-table
//! insert on one thread can make its id visible to a completely unrelated
//! `SELECT ... WHERE id IN ()` translated to `IN (NULL)` on another. spec.md
//! §9 is explicit that this cross-thread coupling is an accepted hack for a
//! specific host behavior, not a design to generalize — it is reproduced
//! here as-is rather than smoothed over.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_GENERATOR_ID: AtomicI64 = AtomicI64::new(0);

/// Matches a generator URI literal carrying a trailing numeric item id,
/// e.g. `'....agents.none://123'`.
static URI_ID_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"://(\d+)(?:[^\d].*)?'").unwrap());

/// Extract the id from a generator-insert's URI literal, if present, and
/// remember it process-wide.
pub fn capture_from_insert_sql(sql: &str) -> Option<i64> {
    let id = URI_ID_PATTERN
        .captures(sql)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())?;
    LAST_GENERATOR_ID.store(id, Ordering::SeqCst);
    Some(id)
}

/// Current slot value, or `None` if nothing has populated it yet.
pub fn current() -> Option<i64> {
    match LAST_GENERATOR_ID.load(Ordering::SeqCst) {
        0 => None,
        id => Some(id),
    }
}

/// Substitute the slot's id into a translated `IN (NULL)` clause produced
/// from an originally empty `IN ()`, when the slot is populated and the SQL
/// references a generator-relevant entity table.
pub fn substitute_in_null(sql: &str, relevant_entity_hint: &str) -> String {
    match current() {
        Some(id) if sql.contains(relevant_entity_hint) && sql.contains("IN (NULL)") => {
            sql.replacen("IN (NULL)", &format!("IN ({id})"), 1)
        }
        _ => sql.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_trailing_numeric_id() {
        let sql = "INSERT INTO metadata_items (guid) VALUES ('com.plexapp.agents.none://4242')";
        assert_eq!(capture_from_insert_sql(sql), Some(4242));
        assert_eq!(current(), Some(4242));
    }

    #[test]
    fn substitutes_only_when_hint_matches() {
        LAST_GENERATOR_ID.store(77, Ordering::SeqCst);
        let hit = substitute_in_null(
            "SELECT 1 FROM metadata_items WHERE id IN (NULL)",
            "metadata_items",
        );
        assert_eq!(hit, "SELECT 1 FROM metadata_items WHERE id IN (77)");
        let miss = substitute_in_null("SELECT 1 FROM other WHERE id IN (NULL)", "metadata_items");
        assert_eq!(miss, "SELECT 1 FROM other WHERE id IN (NULL)");
    }
}
