//! Binary-compatible interception shim for the embedded-database C ABI
//! (spec.md §1). Loaded into a host process ahead of the real
//! `libsqlite3`, this crate's `cdylib` exports shadow a defined subset of
//! that ABI (see [`ffi`]) and, for databases whose path matches the
//! configured redirect list, silently carry statement traffic to a
//! server-database connection instead of the embedded engine.
//!
//! Module map mirrors spec.md §2's component table:
//!
//! - [`config`] — Config
//! - [`classifier`] — Classifier
//! - [`translator`] — Translator
//! - [`registry`] / [`connection`] / [`pool`] — Connection Registry
//! - [`registry`] / [`precached`] — Statement Registry
//! - [`cache`] — Prepared-Statement Cache
//! - [`statement`] — Statement Engine
//! - [`result`] / [`decltype`] — Result Adapter
//! - [`fakevalue`] — Fake-Value Pool
//! - [`ffi`] — Interposition Surface
//!
//! [`sql_hash`], [`lastgen`], [`upsert`], [`pg`], [`error`], [`value`] and
//! [`log`] back one or more of the above without a direct spec.md §2 row
//! of their own.

pub mod cache;
pub mod classifier;
pub mod config;
pub mod connection;
pub mod decltype;
pub mod error;
pub mod fakevalue;
pub mod ffi;
pub mod lastgen;
pub mod log;
pub mod pg;
pub mod pool;
pub mod precached;
pub mod registry;
pub mod result;
pub mod sql_hash;
pub mod statement;
pub mod translator;
pub mod upsert;
pub mod value;

/// Run once from the first intercepted entry point (every `#[no_mangle]`
/// function in [`ffi`] calls this; [`log::init`] itself is idempotent via
/// `OnceCell`). There is no dedicated library-constructor entry point in
/// the embedded-database ABI to hook, so first-touch initialization is the
/// portable substitute.
pub(crate) fn ensure_initialized() {
    log::init();
    once_cell::sync::Lazy::force(&config::CONFIG);
}
