//! Append-only text log sink (spec.md §6).
//!
//! Out of scope per spec.md §1 as a named external collaborator; this is
//! the shim's own minimal implementation of that collaborator, since
//! nothing else in the host process provides one. One entry per line:
//! timestamp, level, message. Rotation is external (spec.md §6) — the
//! shim only ever appends.

use crate::config::CONFIG;
use once_cell::sync::OnceCell;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

static GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Initialize the global tracing subscriber. Idempotent: safe to call from
/// every intercepted entry point, only the first call does anything.
pub fn init() {
    GUARD.get_or_init(|| {
        let path = Path::new(&CONFIG.log_path);
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let file_name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pg-shim.log".to_string());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let subscriber = tracing_subscriber::fmt()
            .with_writer(writer)
            .with_ansi(false)
            .with_target(false)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .finish();
        // A host may have already installed a global default (unlikely for
        // an interposed library, but not impossible); ignore the error.
        let _ = tracing::subscriber::set_global_default(subscriber);
        guard
    });
}
