//! The Connection object (spec.md §3 "Connection object" / §4.3).
//!
//! Grounded on the teacher's `InnerConnection` (`inner_connection.rs`): one
//! struct owning the live handle plus the counters/flags the host's status
//! entry points read, with a mutex serializing wire access. Unlike the
//! teacher, a Connection here may not own its channel directly — pooled
//! databases borrow a thread-owned channel from [`crate::pool`] instead.

use crate::cache::PreparedCache;
use crate::config::Config;
use crate::error::ShimResult;
use crate::pg::{ChannelStatus, PgChannel};
use crate::pool::{self, ChannelHandle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tracing::warn;

pub struct Connection {
    pub path: String,
    pub pooled: bool,
    active: AtomicBool,
    last_changes: AtomicI64,
    last_insert_rowid: AtomicI64,
    /// Present only for non-pooled connections; pooled connections reach
    /// their channel through the thread-local pool instead (spec.md §4.3).
    owned: Option<Mutex<ChannelHandle>>,
}

impl Connection {
    pub fn open(path: &str, pooled: bool, cfg: &Config) -> ShimResult<Self> {
        let owned = if pooled {
            None
        } else {
            Some(Mutex::new(ChannelHandle {
                channel: PgChannel::connect(cfg)?,
                cache: PreparedCache::new(),
            }))
        };
        Ok(Connection {
            path: path.to_string(),
            pooled,
            active: AtomicBool::new(true),
            last_changes: AtomicI64::new(0),
            last_insert_rowid: AtomicI64::new(0),
            owned,
        })
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn mark_inactive(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn last_changes(&self) -> i64 {
        self.last_changes.load(Ordering::Acquire)
    }

    pub fn set_last_changes(&self, n: i64) {
        self.last_changes.store(n, Ordering::Release);
    }

    pub fn last_insert_rowid(&self) -> i64 {
        self.last_insert_rowid.load(Ordering::Acquire)
    }

    pub fn set_last_insert_rowid(&self, id: i64) {
        self.last_insert_rowid.store(id, Ordering::Release);
    }

    /// Run `f` with exclusive access to this connection's channel
    /// (spec.md §5: "Per-connection mutex must be held for any call that
    /// advances the server wire state of that channel"). For a pooled
    /// connection the "lock" is thread ownership of the pool slot, which
    /// gives the same exclusivity without contention across threads.
    pub fn with_channel<T>(
        &self,
        cfg: &Config,
        f: impl FnOnce(&mut ChannelHandle) -> ShimResult<T>,
    ) -> ShimResult<T> {
        match &self.owned {
            Some(mutex) => {
                let mut guard = mutex.lock();
                self.ensure_live(&mut guard);
                f(&mut guard)
            }
            None => pool::with_pooled_channel(&self.path, cfg, |handle| {
                self.ensure_live(handle);
                f(handle)
            }),
        }
    }

    /// Reconnect if the channel was previously marked broken (spec.md §7
    /// `CONNECTION_FAILURE`). The channel remembers its own connect
    /// parameters, so no [`Config`] is needed here.
    fn ensure_live(&self, handle: &mut ChannelHandle) {
        if handle.channel.status() == ChannelStatus::Broken {
            warn!(path = %self.path, "channel broken, reconnecting");
            if handle.channel.reconnect().is_err() {
                self.mark_inactive();
            }
        }
    }

    pub fn close(&self) {
        self.mark_inactive();
        if self.pooled {
            pool::release(&self.path);
        }
    }
}
