use super::{Executor, WorkerPool};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Tracks the jobs submitted through it to a shared [`WorkerPool`], so a
/// caller can wait for its own jobs without waiting for anyone else's.
///
/// Dropping a group without waiting detaches its jobs; they still run.
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use syncpool::{JobGroup, WorkerPool};
///
/// let pool = WorkerPool::new(2).unwrap();
/// let group = JobGroup::new(&pool);
/// let done = Arc::new(AtomicUsize::new(0));
/// for _ in 0..5 {
///     let done = Arc::clone(&done);
///     group.submit(move || {
///         done.fetch_add(1, Ordering::SeqCst);
///     });
/// }
/// group.wait_for_completion();
/// assert_eq!(done.load(Ordering::SeqCst), 5);
/// ```
#[derive(Debug)]
pub struct JobGroup<'a> {
    pool: &'a WorkerPool,
    pending: Arc<Pending>,
}

#[derive(Debug, Default)]
struct Pending {
    count: Mutex<usize>,
    completion: Condvar,
}

impl Pending {
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// counts its job as finished when dropped, whether the job returned,
// panicked, or was discarded unexecuted
struct Completion(Arc<Pending>);

impl Drop for Completion {
    fn drop(&mut self) {
        {
            let mut count = self.0.lock();
            debug_assert!(*count > 0, "group job finished twice");
            *count = count.saturating_sub(1);
        }
        self.0.completion.notify_all();
    }
}

impl<'a> JobGroup<'a> {
    pub fn new(pool: &'a WorkerPool) -> Self {
        JobGroup {
            pool,
            pending: Arc::new(Pending::default()),
        }
    }

    pub fn submit<F>(&self, job: F)
    where
        F: Send + FnOnce() + 'static,
    {
        *self.pending.lock() += 1;
        let completion = Completion(Arc::clone(&self.pending));
        self.pool.submit(move || {
            let _completion = completion;
            job();
        });
    }

    /// Blocks until every job of this group has finished. Jobs from other
    /// submitters on the same pool are not waited for.
    pub fn wait_for_completion(&self) {
        let mut count = self.pending.lock();
        while *count != 0 {
            count = self
                .pending
                .completion
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Jobs of this group not finished yet. Advisory only.
    pub fn pending(&self) -> usize {
        *self.pending.lock()
    }

    pub fn pool(&self) -> &'a WorkerPool {
        self.pool
    }
}

impl Executor for JobGroup<'_> {
    fn submit<F>(&self, job: F)
    where
        F: Send + FnOnce() + 'static,
    {
        JobGroup::submit(self, job)
    }

    fn wait_for_completion(&self) {
        JobGroup::wait_for_completion(self)
    }
}
