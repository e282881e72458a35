use super::{ReadScope, ReadWriteLock, WriteScope};
use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};

/// A value protected by a writer-priority [`ReadWriteLock`].
///
/// ```
/// use syncpool::FairRwLock;
///
/// let counter = FairRwLock::new(0u32);
/// *counter.write() += 1;
/// assert_eq!(*counter.read(), 1);
/// ```
pub struct FairRwLock<T: ?Sized> {
    lock: ReadWriteLock,
    data: UnsafeCell<T>,
}

// same bounds as std::sync::RwLock
unsafe impl<T: ?Sized + Send> Send for FairRwLock<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for FairRwLock<T> {}

impl<T> FairRwLock<T> {
    pub fn new(value: T) -> Self {
        FairRwLock {
            lock: ReadWriteLock::new(),
            data: UnsafeCell::new(value),
        }
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: ?Sized> FairRwLock<T> {
    pub fn read(&self) -> ReadGuard<'_, T> {
        ReadGuard {
            _scope: self.lock.read(),
            // a shared hold is active for the guard's lifetime
            data: unsafe { &*self.data.get() },
        }
    }

    pub fn try_read(&self) -> Option<ReadGuard<'_, T>> {
        let scope = self.lock.try_read()?;
        Some(ReadGuard {
            _scope: scope,
            data: unsafe { &*self.data.get() },
        })
    }

    pub fn write(&self) -> WriteGuard<'_, T> {
        WriteGuard {
            _scope: self.lock.write(),
            // the exclusive hold makes this the only reference
            data: unsafe { &mut *self.data.get() },
        }
    }

    pub fn try_write(&self) -> Option<WriteGuard<'_, T>> {
        let scope = self.lock.try_write()?;
        Some(WriteGuard {
            _scope: scope,
            data: unsafe { &mut *self.data.get() },
        })
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    /// The underlying raw lock, for status inspection.
    pub fn raw(&self) -> &ReadWriteLock {
        &self.lock
    }
}

impl<T: Default> Default for FairRwLock<T> {
    fn default() -> Self {
        FairRwLock::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for FairRwLock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_read() {
            Some(guard) => f.debug_struct("FairRwLock").field("data", &&*guard).finish(),
            None => f
                .debug_struct("FairRwLock")
                .field("data", &format_args!("<locked>"))
                .finish(),
        }
    }
}

pub struct ReadGuard<'a, T: ?Sized> {
    _scope: ReadScope<'a>,
    data: &'a T,
}

impl<T: ?Sized> Deref for ReadGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.data
    }
}

pub struct WriteGuard<'a, T: ?Sized> {
    _scope: WriteScope<'a>,
    data: &'a mut T,
}

impl<T: ?Sized> Deref for WriteGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &*self.data
    }
}

impl<T: ?Sized> DerefMut for WriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut *self.data
    }
}
