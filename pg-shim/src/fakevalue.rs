//! Fake-Value Pool (spec.md §3 "Fake-value object" / §4.5 "Column-value").
//!
//! The C original poses as the embedded library's opaque `sqlite3_value*`
//! with a magic-number prefix read back out of arbitrary host-supplied
//! pointers. spec.md §9 calls that out directly and recommends a tagged
//! pointer instead: "either an ownership-tracked shim value or an
//! untranslated pass-through; the value-accessor family dispatches on the
//! tag." This pool follows that advice — a process-wide address registry
//! stands in for the magic-number check, so recognizing a fake value never
//! requires reading through a pointer we didn't allocate.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use pg_shim_sys::{sqlite3_stmt, sqlite3_value};
use std::collections::HashMap;

/// Per-statement ring of fake-value records (spec.md §9 deviation: scoped
/// to the owning statement rather than one shared 256-entry process pool).
const RING_CAPACITY: usize = 16;

#[derive(Clone, Copy)]
pub struct FakeValue {
    pub stmt: *mut sqlite3_stmt,
    pub column: usize,
    pub row: i64,
}

unsafe impl Send for FakeValue {}

pub struct FakeValuePool {
    slots: Vec<FakeValue>,
    next: usize,
}

/// Process-wide address -> record map backing [`FakeValuePool::recognize`]
/// without requiring the caller to know which statement's pool a given
/// `sqlite3_value*` came from (the [`crate::ffi::value`] family only has
/// the bare pointer to work with). The map is keyed by the exact claimed
/// address, so a pointer we never allocated is a guaranteed miss.
static REGISTRY: Lazy<Mutex<HashMap<usize, FakeValue>>> = Lazy::new(|| Mutex::new(HashMap::new()));

impl FakeValuePool {
    pub fn new() -> Self {
        FakeValuePool {
            slots: vec![
                FakeValue {
                    stmt: std::ptr::null_mut(),
                    column: 0,
                    row: -1,
                };
                RING_CAPACITY
            ],
            next: 0,
        }
    }

    /// Claim the next ring slot for `(stmt, column, row)` and return an
    /// opaque pointer suitable for handing back to the host as a
    /// `sqlite3_value*`.
    pub fn claim(&mut self, stmt: *mut sqlite3_stmt, column: usize, row: i64) -> *mut sqlite3_value {
        let idx = self.next;
        self.next = (self.next + 1) % self.slots.len();
        self.slots[idx] = FakeValue { stmt, column, row };
        let addr = self.slots.as_ptr().wrapping_add(idx) as usize;
        REGISTRY.lock().insert(addr, self.slots[idx]);
        addr as *mut sqlite3_value
    }

    /// Recognize and resolve a value pointer previously returned by
    /// [`claim`] on *any* statement's pool, if it is one of ours. A
    /// pointer we never allocated is assumed to be the shadow
    /// embedded-library's own value and is left for passthrough handling
    /// (spec.md §4.5: "checks the magic and, if recognized, routes through
    /// the statement's result ... otherwise forwards to the original
    /// library's accessor").
    pub fn recognize(value: *mut sqlite3_value) -> Option<FakeValue> {
        REGISTRY.lock().get(&(value as usize)).copied()
    }

    /// Release every slot this pool ever claimed (statement finalize).
    pub fn release_all(&self) {
        let mut live = REGISTRY.lock();
        let base = self.slots.as_ptr() as usize;
        let end = base + self.slots.len() * std::mem::size_of::<FakeValue>();
        live.retain(|addr, _| *addr < base || *addr >= end);
    }
}

impl Default for FakeValuePool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FakeValuePool {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claimed_pointer_resolves_back_to_its_record() {
        let mut pool = FakeValuePool::new();
        let stmt = 0x4000 as *mut sqlite3_stmt;
        let ptr = pool.claim(stmt, 2, 7);

        let fv = FakeValuePool::recognize(ptr).expect("claimed pointer must be recognized");
        assert_eq!(fv.stmt, stmt);
        assert_eq!(fv.column, 2);
        assert_eq!(fv.row, 7);
    }

    #[test]
    fn unrecognized_pointer_returns_none() {
        let bogus = 0xdead_beef_usize as *mut sqlite3_value;
        assert!(FakeValuePool::recognize(bogus).is_none());
    }

    #[test]
    fn release_all_forgets_this_pools_slots_but_not_anothers() {
        let mut a = FakeValuePool::new();
        let mut b = FakeValuePool::new();
        let stmt = 0x4001 as *mut sqlite3_stmt;
        let ptr_a = a.claim(stmt, 0, 0);
        let ptr_b = b.claim(stmt, 1, 0);

        a.release_all();
        assert!(FakeValuePool::recognize(ptr_a).is_none());
        assert!(FakeValuePool::recognize(ptr_b).is_some());

        b.release_all();
        assert!(FakeValuePool::recognize(ptr_b).is_none());
    }

    #[test]
    fn ring_wraps_and_overwrites_oldest_slot() {
        let mut pool = FakeValuePool::new();
        let stmt = 0x4002 as *mut sqlite3_stmt;
        let first = pool.claim(stmt, 0, 0);
        for i in 1..RING_CAPACITY {
            pool.claim(stmt, i, i as i64);
        }
        // One full lap: the slot backing `first` has been overwritten with
        // column `RING_CAPACITY`'s record, so the pointer now resolves to
        // that record instead of column 0's.
        let wrapped = pool.claim(stmt, 99, 99);
        assert_eq!(first, wrapped, "ring capacity is fixed, so the address repeats");
        let fv = FakeValuePool::recognize(wrapped).unwrap();
        assert_eq!(fv.column, 99);
    }
}
