use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, TryLockError};

mod data;
mod scope;
pub use data::{FairRwLock, ReadGuard, WriteGuard};
pub use scope::{ReadScope, WriteScope};

/// A read/write lock that gives waiting writers priority over new readers.
///
/// Any number of readers may hold the lock at once, or exactly one writer.
/// As soon as a writer starts waiting, new shared acquisitions block until
/// every pending writer has been served, so a steady stream of writers can
/// starve readers.
///
/// Acquiring the exclusive lock twice from the same thread deadlocks, and
/// releasing a lock that is not held is a bug in the caller. Neither is
/// detected at runtime beyond debug assertions.
///
/// ```
/// use syncpool::ReadWriteLock;
///
/// let lock = ReadWriteLock::new();
/// {
///     let _first = lock.read();
///     let _second = lock.read();
///     assert!(lock.try_write().is_none());
/// }
/// assert!(lock.try_write().is_some());
/// ```
#[derive(Debug, Default)]
pub struct ReadWriteLock {
    state: Mutex<State>,
    reading_allowed: Condvar,
    writing_allowed: Condvar,
}

#[derive(Debug, Default)]
struct State {
    readers: usize,
    writer: bool,
    // non-zero blocks new readers
    writers_waiting: usize,
}

impl State {
    fn check(&self) {
        debug_assert!(
            !(self.writer && self.readers != 0),
            "writer held together with {} readers",
            self.readers
        );
    }

    fn readers_admitted(&self) -> bool {
        !self.writer && self.writers_waiting == 0
    }

    fn writer_admitted(&self) -> bool {
        !self.writer && self.readers == 0
    }
}

/// Snapshot of a [`ReadWriteLock`], stale as soon as it is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockStatus {
    pub readers: usize,
    pub writer_held: bool,
    pub writers_waiting: usize,
}

impl ReadWriteLock {
    pub fn new() -> Self {
        ReadWriteLock::default()
    }

    /// Blocks until no writer holds or waits for the lock, then takes a
    /// shared hold.
    pub fn acquire_shared(&self) {
        let mut state = self.lock_state();
        while !state.readers_admitted() {
            state = self
                .reading_allowed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.readers += 1;
        state.check();
    }

    /// Takes a shared hold without blocking. Fails when the lock is busy with
    /// another operation or when a writer holds or waits for it.
    pub fn try_acquire_shared(&self) -> bool {
        let mut state = match self.try_lock_state() {
            Some(state) => state,
            None => return false,
        };
        if !state.readers_admitted() {
            return false;
        }
        state.readers += 1;
        state.check();
        true
    }

    pub fn release_shared(&self) {
        let mut state = self.lock_state();
        debug_assert!(state.readers > 0, "shared release without a shared hold");
        state.readers = state.readers.saturating_sub(1);
        if state.readers == 0 {
            self.writing_allowed.notify_one();
        }
    }

    /// Announces a pending writer, which stops new readers from entering, then
    /// blocks until the lock is free.
    pub fn acquire_exclusive(&self) {
        let mut state = self.lock_state();
        state.writers_waiting += 1;
        while !state.writer_admitted() {
            state = self
                .writing_allowed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.writer = true;
        state.writers_waiting -= 1;
        state.check();
    }

    /// Takes the exclusive hold without blocking. Only succeeds when nobody
    /// holds the lock; waiting writers are not taken into account.
    pub fn try_acquire_exclusive(&self) -> bool {
        let mut state = match self.try_lock_state() {
            Some(state) => state,
            None => return false,
        };
        if !state.writer_admitted() {
            return false;
        }
        state.writer = true;
        state.check();
        true
    }

    /// Hands the lock to one waiting writer if there is one, otherwise lets
    /// every waiting reader in.
    pub fn release_exclusive(&self) {
        let mut state = self.lock_state();
        debug_assert!(state.writer, "exclusive release without an exclusive hold");
        state.writer = false;
        if state.writers_waiting != 0 {
            self.writing_allowed.notify_one();
        } else {
            self.reading_allowed.notify_all();
        }
    }

    pub fn read(&self) -> ReadScope<'_> {
        ReadScope::new(self)
    }

    pub fn try_read(&self) -> Option<ReadScope<'_>> {
        ReadScope::try_new(self)
    }

    pub fn write(&self) -> WriteScope<'_> {
        WriteScope::new(self)
    }

    pub fn try_write(&self) -> Option<WriteScope<'_>> {
        WriteScope::try_new(self)
    }

    pub fn status(&self) -> LockStatus {
        let state = self.lock_state();
        LockStatus {
            readers: state.readers,
            writer_held: state.writer,
            writers_waiting: state.writers_waiting,
        }
    }

    // user code never runs while the state mutex is held, so a poisoned
    // mutex still guards a consistent state
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_lock_state(&self) -> Option<MutexGuard<'_, State>> {
        match self.state.try_lock() {
            Ok(state) => Some(state),
            Err(TryLockError::Poisoned(err)) => Some(err.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unlocked() {
        let lock = ReadWriteLock::new();
        assert_eq!(
            lock.status(),
            LockStatus {
                readers: 0,
                writer_held: false,
                writers_waiting: 0,
            }
        );
    }

    #[test]
    fn try_variants_fail_while_state_is_busy() {
        let lock = ReadWriteLock::new();
        let before = lock.status();
        {
            let _busy = lock.state.lock().unwrap();
            crossbeam::scope(|s| {
                s.spawn(|_| {
                    assert!(!lock.try_acquire_shared());
                    assert!(!lock.try_acquire_exclusive());
                });
            })
            .unwrap();
        }
        assert_eq!(lock.status(), before);
        assert!(lock.try_acquire_shared());
        lock.release_shared();
    }

    #[test]
    fn readers_coexist() {
        let lock = ReadWriteLock::new();
        lock.acquire_shared();
        lock.acquire_shared();
        assert!(lock.try_acquire_shared());
        assert_eq!(lock.status().readers, 3);
        lock.release_shared();
        lock.release_shared();
        lock.release_shared();
        assert_eq!(lock.status().readers, 0);
    }

    #[test]
    fn writer_excludes_everyone() {
        let lock = ReadWriteLock::new();
        assert!(lock.try_acquire_exclusive());
        assert!(!lock.try_acquire_shared());
        assert!(!lock.try_acquire_exclusive());
        lock.release_exclusive();
        assert!(lock.try_acquire_shared());
        lock.release_shared();
    }

    #[test]
    fn try_exclusive_fails_under_readers() {
        let lock = ReadWriteLock::new();
        lock.acquire_shared();
        assert!(!lock.try_acquire_exclusive());
        lock.release_shared();
        assert!(lock.try_acquire_exclusive());
        lock.release_exclusive();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "shared release without a shared hold")]
    fn stray_shared_release_asserts() {
        ReadWriteLock::new().release_shared();
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "exclusive release without an exclusive hold")]
    fn stray_exclusive_release_asserts() {
        ReadWriteLock::new().release_exclusive();
    }
}
