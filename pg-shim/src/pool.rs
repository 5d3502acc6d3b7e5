//! Per-thread connection pool for heavy-use databases (spec.md §4.3).
//!
//! A bounded set of physical channels exists per redirected path. A thread
//! borrows one the first time it touches a pooled [`crate::connection::Connection`]
//! and keeps it in thread-local storage for the rest of its lifetime;
//! acquisition blocks when the pool is exhausted. The borrowed channel is
//! returned to the pool when the thread exits (the `thread_local!` destructor)
//! or when [`release`] is called explicitly on handle close.

use crate::cache::PreparedCache;
use crate::config::Config;
use crate::error::{ShimError, ShimResult};
use crate::pg::PgChannel;
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Default number of channels kept per pooled path.
const DEFAULT_POOL_SIZE: usize = 8;

pub struct ChannelHandle {
    pub channel: PgChannel,
    pub cache: PreparedCache,
}

impl ChannelHandle {
    fn new(cfg: &Config) -> ShimResult<Self> {
        Ok(ChannelHandle {
            channel: PgChannel::connect(cfg)?,
            cache: PreparedCache::new(),
        })
    }
}

struct PathPool {
    idle: Mutex<VecDeque<ChannelHandle>>,
    not_empty: Condvar,
    outstanding: Mutex<usize>,
    max_size: usize,
}

impl PathPool {
    fn new(max_size: usize) -> Self {
        PathPool {
            idle: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
            outstanding: Mutex::new(0),
            max_size,
        }
    }

    /// Acquire a channel: reuse an idle one, create a fresh one while under
    /// capacity, or block until a peer thread releases one.
    fn acquire(&self, cfg: &Config) -> ShimResult<ChannelHandle> {
        {
            let mut idle = self.idle.lock();
            if let Some(h) = idle.pop_front() {
                return Ok(h);
            }
        }
        let got_permit = {
            let mut outstanding = self.outstanding.lock();
            if *outstanding < self.max_size {
                *outstanding += 1;
                true
            } else {
                false
            }
        };
        if got_permit {
            return ChannelHandle::new(cfg).map_err(|e| {
                *self.outstanding.lock() -= 1;
                e
            });
        }
        let mut idle = self.idle.lock();
        loop {
            if let Some(h) = idle.pop_front() {
                return Ok(h);
            }
            self.not_empty.wait(&mut idle);
        }
    }

    fn release(&self, handle: ChannelHandle) {
        let mut idle = self.idle.lock();
        idle.push_back(handle);
        self.not_empty.notify_one();
    }
}

static POOLS: Lazy<Mutex<HashMap<String, Arc<PathPool>>>> = Lazy::new(|| Mutex::new(HashMap::new()));

fn pool_for(path: &str) -> Arc<PathPool> {
    let mut pools = POOLS.lock();
    pools
        .entry(path.to_string())
        .or_insert_with(|| Arc::new(PathPool::new(DEFAULT_POOL_SIZE)))
        .clone()
}

/// A channel borrowed from a path's pool, returned automatically on drop.
struct Borrowed {
    pool: Arc<PathPool>,
    handle: Option<ChannelHandle>,
}

impl Drop for Borrowed {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.pool.release(handle);
        }
    }
}

thread_local! {
    static TLS_POOL: RefCell<HashMap<String, Borrowed>> = RefCell::new(HashMap::new());
}

/// Run `f` against this thread's dedicated channel for `path`, acquiring
/// one from the pool on first use (spec.md §4.3 pool affinity invariant).
pub fn with_pooled_channel<T>(
    path: &str,
    cfg: &Config,
    f: impl FnOnce(&mut ChannelHandle) -> ShimResult<T>,
) -> ShimResult<T> {
    TLS_POOL.with(|tls| {
        let mut map = tls.borrow_mut();
        if !map.contains_key(path) {
            let pool = pool_for(path);
            let handle = pool.acquire(cfg)?;
            map.insert(
                path.to_string(),
                Borrowed {
                    pool,
                    handle: Some(handle),
                },
            );
        }
        let borrowed = map.get_mut(path).ok_or(ShimError::ConnectionFailure(
            "pool entry vanished unexpectedly".to_string(),
        ))?;
        let handle = borrowed
            .handle
            .as_mut()
            .expect("borrowed pool slot always holds a channel while present in the map");
        f(handle)
    })
}

/// Drop this thread's channel for `path`, returning it to the pool
/// immediately rather than waiting for thread exit (handle close).
pub fn release(path: &str) {
    TLS_POOL.with(|tls| {
        tls.borrow_mut().remove(path);
    });
}
