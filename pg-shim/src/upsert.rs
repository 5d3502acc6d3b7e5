//! Settings-table upsert rewrite (spec.md §4.4, §9).
//!
//! spec.md §9 flags the original's hardcoded upsert rule as host-specific
//! and says it "should be a plug-in policy, not a hardcoded path." This
//! module follows that: [`WritePolicy`] is a trait, [`SettingsUpsertPolicy`]
//! is the one concrete implementation shipped (matching the watched/
//! unwatched toggle semantics spec.md describes), and callers needing a
//! different host's semantics can supply their own.

pub trait WritePolicy: Send + Sync {
    /// If this statement's insert should become an upsert, return the
    /// rewritten SQL; otherwise return `None` and the statement proceeds
    /// unmodified.
    fn rewrite(&self, translated_sql: &str) -> Option<String>;
}

/// Rewrites a plain `INSERT INTO <table> (...) VALUES (...)` against a
/// configured settings-like table into an explicit `ON CONFLICT` upsert,
/// provided the statement doesn't already specify conflict handling.
pub struct SettingsUpsertPolicy {
    pub table: String,
    pub conflict_key: String,
    /// Columns updated on conflict; `watched`/`unwatched`-style toggle
    /// columns the host expects to be overwritten rather than preserved.
    pub update_columns: Vec<String>,
}

impl SettingsUpsertPolicy {
    pub fn new(table: impl Into<String>, conflict_key: impl Into<String>, update_columns: Vec<String>) -> Self {
        SettingsUpsertPolicy {
            table: table.into(),
            conflict_key: conflict_key.into(),
            update_columns,
        }
    }
}

impl WritePolicy for SettingsUpsertPolicy {
    fn rewrite(&self, translated_sql: &str) -> Option<String> {
        let lower = translated_sql.to_ascii_lowercase();
        let insert_marker = format!("insert into {}", self.table.to_ascii_lowercase());
        if !lower.starts_with(&insert_marker) || lower.contains("on conflict") {
            return None;
        }
        let set_clause = self
            .update_columns
            .iter()
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        if set_clause.is_empty() {
            return None;
        }
        let on_conflict = format!("ON CONFLICT ({}) DO UPDATE SET {set_clause}", self.conflict_key);

        // Postgres requires `ON CONFLICT` to precede `RETURNING` in an
        // `INSERT`; if the caller's SQL already carries a trailing
        // `RETURNING` clause (ordinarily not the case, since the engine
        // runs this rewrite before its own `RETURNING id` injection), splice
        // `ON CONFLICT` in ahead of it rather than appending blindly.
        match lower.rfind(" returning ") {
            Some(idx) => {
                let (head, tail) = translated_sql.split_at(idx);
                Some(format!("{head} {on_conflict}{tail}"))
            }
            None => Some(format!("{translated_sql} {on_conflict}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_plain_insert_into_settings_table() {
        let policy = SettingsUpsertPolicy::new(
            "preferences",
            "id",
            vec!["watched".to_string()],
        );
        let rewritten = policy
            .rewrite("INSERT INTO preferences (id, watched) VALUES ($1, $2)")
            .unwrap();
        assert!(rewritten.contains("ON CONFLICT (id) DO UPDATE SET watched = EXCLUDED.watched"));
    }

    #[test]
    fn leaves_statements_with_existing_conflict_clause_untouched() {
        let policy = SettingsUpsertPolicy::new("preferences", "id", vec!["watched".to_string()]);
        assert!(policy
            .rewrite("INSERT INTO preferences (id) VALUES ($1) ON CONFLICT DO NOTHING")
            .is_none());
    }

    #[test]
    fn splices_on_conflict_ahead_of_a_trailing_returning_clause() {
        let policy = SettingsUpsertPolicy::new("preferences", "id", vec!["watched".to_string()]);
        let rewritten = policy
            .rewrite("INSERT INTO preferences (id, watched) VALUES ($1, $2) RETURNING id")
            .unwrap();
        let on_conflict_pos = rewritten.find("ON CONFLICT").unwrap();
        let returning_pos = rewritten.find("RETURNING").unwrap();
        assert!(
            on_conflict_pos < returning_pos,
            "ON CONFLICT must precede RETURNING: {rewritten}"
        );
    }

    #[test]
    fn leaves_other_tables_untouched() {
        let policy = SettingsUpsertPolicy::new("preferences", "id", vec!["watched".to_string()]);
        assert!(policy
            .rewrite("INSERT INTO metadata_items (id) VALUES ($1)")
            .is_none());
    }
}
