// Lock helpers.
// Mutex access that recovers from poisoning instead of panicking.

use std::sync::{Mutex, MutexGuard};

use tracing::warn;

/// Lock a coordinator mutex, recovering the state if a holder panicked.
pub(crate) fn mutex_lock<'a, T>(lock: &'a Mutex<T>, op: &'static str) -> MutexGuard<'a, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                lock_kind = "mutex.lock",
                result = "poisoned_recovered",
                "Recovered from poisoned coordinator lock"
            );
            poisoned.into_inner()
        }
    }
}
