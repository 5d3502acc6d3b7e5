//! Pure classification of SQL text and database paths (spec.md §4.1).

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Read,
    Write,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub redirect: bool,
    pub skip: bool,
    pub kind: Kind,
}

/// Substrings that mark a statement as a no-op under redirection
/// (spec.md §4.1). Kept as data, not a hardcoded match arm chain, per
/// spec.md §9's open question about auditing this list against real
/// traffic — callers can swap in a different list via [`classify_with`].
pub const DEFAULT_SKIP_PATTERNS: &[&str] = &[
    "pragma ",
    "attach database",
    "detach database",
    "sqlite_sequence",
    "fts4aux",
    "fts3_tokenizer",
    "match ?",
    "savepoint",
    "release savepoint",
    "rollback to",
    "rollback transaction",
    "load_extension(",
    "typeof(",
];

pub fn classify(sql: &str, db_path: &str, cfg: &Config) -> Classification {
    classify_with(sql, db_path, cfg.matches(db_path), DEFAULT_SKIP_PATTERNS)
}

pub fn classify_with(
    sql: &str,
    _db_path: &str,
    redirect: bool,
    skip_patterns: &[&str],
) -> Classification {
    let trimmed = sql.trim_start();
    let lower = trimmed.to_ascii_lowercase();

    let skip = skip_patterns.iter().any(|p| lower.contains(p));

    let kind = first_keyword(&lower);

    Classification {
        redirect,
        skip,
        kind,
    }
}

fn first_keyword(lower_sql: &str) -> Kind {
    let word: String = lower_sql
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    match word.as_str() {
        "select" => Kind::Read,
        "insert" | "update" | "delete" | "replace" => Kind::Write,
        _ => Kind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_matching(db: &str) -> Config {
        Config {
            host: "localhost".into(),
            port: 5432,
            database: db.into(),
            user: "plex".into(),
            password: "".into(),
            schema: "plex".into(),
            redirect_patterns: vec![db.into()],
            pool_patterns: vec![db.into()],
            log_path: "/tmp/x.log".into(),
            connect_timeout_secs: 5,
        }
    }

    #[test]
    fn pragma_is_skipped_case_and_space_insensitive() {
        let cfg = cfg_matching("plex.db");
        let c = classify("   PRAGMA journal_mode=WAL", "plex.db", &cfg);
        assert!(c.skip);
        assert!(c.redirect);
    }

    #[test]
    fn select_is_read_insert_is_write() {
        let cfg = cfg_matching("plex.db");
        assert_eq!(classify("SELECT 1", "plex.db", &cfg).kind, Kind::Read);
        assert_eq!(
            classify("insert into t values (1)", "plex.db", &cfg).kind,
            Kind::Write
        );
        assert_eq!(
            classify("CREATE TABLE t (x int)", "plex.db", &cfg).kind,
            Kind::Other
        );
    }

    #[test]
    fn skip_match_is_substring_anywhere() {
        let cfg = cfg_matching("plex.db");
        let c = classify(
            "SELECT typeof(x) FROM t",
            "plex.db",
            &cfg,
        );
        assert!(c.skip, "substring match for skip patterns is deliberate");
    }

    #[test]
    fn non_matching_path_is_not_redirected() {
        let cfg = cfg_matching("plex.db");
        let c = classify("SELECT 1", "/var/lib/other/app.db", &cfg);
        assert!(!c.redirect);
    }
}
