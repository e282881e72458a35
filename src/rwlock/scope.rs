use super::ReadWriteLock;

/// Shared hold on a [`ReadWriteLock`], released on drop.
#[must_use = "the shared hold is released as soon as the scope is dropped"]
#[derive(Debug)]
pub struct ReadScope<'a> {
    lock: &'a ReadWriteLock,
}

impl<'a> ReadScope<'a> {
    pub fn new(lock: &'a ReadWriteLock) -> Self {
        lock.acquire_shared();
        ReadScope { lock }
    }

    pub fn try_new(lock: &'a ReadWriteLock) -> Option<Self> {
        if lock.try_acquire_shared() {
            Some(ReadScope { lock })
        } else {
            None
        }
    }
}

impl Drop for ReadScope<'_> {
    fn drop(&mut self) {
        self.lock.release_shared();
    }
}

/// Exclusive hold on a [`ReadWriteLock`], released on drop.
#[must_use = "the exclusive hold is released as soon as the scope is dropped"]
#[derive(Debug)]
pub struct WriteScope<'a> {
    lock: &'a ReadWriteLock,
}

impl<'a> WriteScope<'a> {
    pub fn new(lock: &'a ReadWriteLock) -> Self {
        lock.acquire_exclusive();
        WriteScope { lock }
    }

    pub fn try_new(lock: &'a ReadWriteLock) -> Option<Self> {
        if lock.try_acquire_exclusive() {
            Some(WriteScope { lock })
        } else {
            None
        }
    }
}

impl Drop for WriteScope<'_> {
    fn drop(&mut self) {
        self.lock.release_exclusive();
    }
}
