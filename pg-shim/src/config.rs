//! Environment-variable configuration, loaded once at library-load time.
//!
//! Out of scope per spec.md §1: this module is the shim's own replacement
//! for that collaborator, since the shim has no other place to get its
//! connection parameters from. Values are read once; later changes to the
//! process environment have no effect, matching spec.md §6.

use once_cell::sync::Lazy;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub schema: String,
    /// Substrings of a database file path that mark it for redirection.
    /// Defaults to `[database]`: without a dedicated env var, the most
    /// faithful reading of spec.md §3/§4.1 is that a path is redirected
    /// when it names the configured database.
    pub redirect_patterns: Vec<String>,
    /// Substrings marking a redirected path as high-traffic, i.e. eligible
    /// for the per-thread channel pool (spec.md §4.3). Not in spec.md §6's
    /// environment table; defaults to the redirect list itself so every
    /// redirected database is poolable unless narrowed via `POOL_DATABASES`.
    pub pool_patterns: Vec<String>,
    pub log_path: String,
    pub connect_timeout_secs: u64,
}

impl Config {
    fn from_env() -> Self {
        let database = env_or("DATABASE", "plex");
        let redirect_patterns = match env::var("REDIRECT_DATABASES") {
            Ok(v) if !v.trim().is_empty() => {
                v.split(',').map(|s| s.trim().to_string()).collect()
            }
            _ => vec![database.clone()],
        };
        let pool_patterns = match env::var("POOL_DATABASES") {
            Ok(v) if !v.trim().is_empty() => {
                v.split(',').map(|s| s.trim().to_string()).collect()
            }
            _ => redirect_patterns.clone(),
        };
        Config {
            host: env_or("HOST", "localhost"),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5432),
            database,
            user: env_or("USER", "plex"),
            password: env_or("PASSWORD", ""),
            schema: env_or("SCHEMA", "plex"),
            redirect_patterns,
            pool_patterns,
            log_path: env::var("SHIM_LOG_PATH")
                .unwrap_or_else(|_| default_log_path()),
            connect_timeout_secs: env::var("CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        }
    }

    /// True if `path` should be redirected to the server database.
    pub fn matches(&self, path: &str) -> bool {
        self.redirect_patterns.iter().any(|p| !p.is_empty() && path.contains(p.as_str()))
    }

    /// True if `path` is a high-traffic database eligible for the
    /// per-thread channel pool (spec.md §4.3).
    pub fn pooled(&self, path: &str) -> bool {
        self.pool_patterns.iter().any(|p| !p.is_empty() && path.contains(p.as_str()))
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn default_log_path() -> String {
    env::temp_dir().join("pg-shim.log").to_string_lossy().into_owned()
}

pub static CONFIG: Lazy<Config> = Lazy::new(Config::from_env);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        // Constructed directly (not through the process env) so the test
        // is independent of whatever the test harness's environment holds.
        let cfg = Config {
            host: "localhost".into(),
            port: 5432,
            database: "plex".into(),
            user: "plex".into(),
            password: "".into(),
            schema: "plex".into(),
            redirect_patterns: vec!["plex".into()],
            pool_patterns: vec!["plex".into()],
            log_path: "/tmp/pg-shim.log".into(),
            connect_timeout_secs: 5,
        };
        assert!(cfg.matches("/var/lib/plex/com.plexapp.plugins.library.db"));
        assert!(!cfg.matches("/var/lib/other/app.db"));
    }

    #[test]
    fn redirect_patterns_split_on_comma() {
        std::env::set_var("REDIRECT_DATABASES", "library.db, blobs.db");
        let cfg = Config::from_env();
        std::env::remove_var("REDIRECT_DATABASES");
        assert_eq!(cfg.redirect_patterns, vec!["library.db", "blobs.db"]);
    }
}
