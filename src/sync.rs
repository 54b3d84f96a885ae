use std::sync::{Mutex, MutexGuard};

/// Acquire a mutex guard, ignoring poisoning.
///
/// The guarded state in this crate is a set of independent map entries
/// (pending calls, providers, ack deadlines). A panic while holding one of
/// these locks cannot leave a half-updated invariant spanning entries, so the
/// worst outcome of continuing is a single stale entry.
pub(crate) fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
