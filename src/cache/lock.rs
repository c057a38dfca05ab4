//! Poison recovery for the published snapshot slot.
//!
//! The slot only ever holds a complete `Arc<Snapshot>`: a publisher that
//! panics mid-swap leaves either the old pointer or the new one behind. The
//! value behind a poisoned lock is therefore still a valid snapshot and
//! readers keep serving it.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

const SOURCE: &str = "cache::lock";

pub(crate) fn read_slot<'a, T>(slot: &'a RwLock<T>, op: &'static str) -> RwLockReadGuard<'a, T> {
    slot.read().unwrap_or_else(|poisoned| {
        warn!(target = SOURCE, op, "Snapshot slot poisoned by a panicking publisher; serving last snapshot");
        poisoned.into_inner()
    })
}

pub(crate) fn write_slot<'a, T>(slot: &'a RwLock<T>, op: &'static str) -> RwLockWriteGuard<'a, T> {
    slot.write().unwrap_or_else(|poisoned| {
        warn!(target = SOURCE, op, "Snapshot slot poisoned by a panicking publisher; replacing it");
        poisoned.into_inner()
    })
}

#[cfg(test)]
mod tests {
    use std::panic;
    use std::sync::Arc;

    use super::*;

    #[test]
    fn poisoned_slot_keeps_its_last_value() {
        let slot = Arc::new(RwLock::new(7_u64));
        let poisoner = Arc::clone(&slot);
        let _ = panic::catch_unwind(move || {
            let _guard = poisoner.write().unwrap();
            panic!("publisher failed");
        });
        assert!(slot.is_poisoned());

        assert_eq!(*read_slot(&slot, "read"), 7);
        *write_slot(&slot, "publish") = 8;
        assert_eq!(*read_slot(&slot, "read"), 8);
    }
}
