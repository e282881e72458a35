use super::{supervisor::Supervisor, Executor, Job, Message};
use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crossbeam::channel::{unbounded, Sender};
use slog::{debug, error, info, o, warn, Discard, Logger};
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// A fixed set of worker threads draining one FIFO job queue.
///
/// Workers start as soon as the pool is built and live until it is dropped.
/// Dropping the pool does not run queued jobs: call
/// [`wait_for_completion`](WorkerPool::wait_for_completion) first if they
/// must all run.
///
/// Jobs must not panic. The pool does not catch panics; a worker whose job
/// panics dies and is replaced by a fresh one. If the replacement cannot be
/// spawned the pool keeps running one worker short, so
/// [`thread_count`](WorkerPool::thread_count) is the configured size and not
/// necessarily the number of live workers.
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use syncpool::WorkerPool;
///
/// let pool = WorkerPool::new(4).unwrap();
/// let counter = Arc::new(AtomicUsize::new(0));
/// for _ in 0..10 {
///     let counter = Arc::clone(&counter);
///     pool.submit(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     });
/// }
/// pool.wait_for_completion();
/// assert_eq!(counter.load(Ordering::SeqCst), 10);
/// ```
pub struct WorkerPool {
    shared: Arc<Shared>,
    supervisor_sender: Sender<Message>,
    supervisor: Option<JoinHandle<()>>,
    logger: Logger,
}

impl WorkerPool {
    /// Builds a pool of `threads` workers, 0 picks one per hardware thread.
    pub fn new(threads: usize) -> Result<Self> {
        WorkerPool::with_config(&PoolConfig::new(threads), Logger::root(Discard, o!()))
    }

    pub fn with_config(config: &PoolConfig, logger: Logger) -> Result<Self> {
        let size = config.resolved_threads();
        let logger = logger.new(o!("pool" => config.name.clone()));
        let shared = Arc::new(Shared::new(size));
        let (supervisor_sender, supervisor_receiver) = unbounded::<Message>();

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let worker = Worker::spawn(
                id,
                &config.name,
                Arc::clone(&shared),
                supervisor_sender.clone(),
                &logger,
            );
            match worker {
                Ok(worker) => workers.push(worker),
                Err(err) => {
                    shared.terminate();
                    for worker in workers.iter_mut() {
                        worker.join();
                    }
                    return Err(Error::spawn(worker_name(&config.name, id), err));
                }
            }
        }

        let mut supervisor = Supervisor::new(
            supervisor_receiver,
            supervisor_sender.clone(),
            workers,
            Arc::clone(&shared),
            config.name.clone(),
            logger.clone(),
        );
        let name = format!("{} supervisor", config.name);
        let supervisor = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                // supervise all
                supervisor.watch();
            })
            .map_err(|err| {
                // detached workers see the flag and exit on their own
                shared.terminate();
                Error::spawn(name, err)
            })?;

        info!(logger, "worker pool started"; "threads" => size);
        Ok(WorkerPool {
            shared,
            supervisor_sender,
            supervisor: Some(supervisor),
            logger,
        })
    }

    /// Appends `job` to the queue and wakes one idle worker.
    pub fn submit<F>(&self, job: F)
    where
        F: Send + FnOnce() + 'static,
    {
        self.shared.push(Box::new(job));
    }

    /// Blocks until the queue is empty and no worker is running a job.
    ///
    /// Jobs submitted concurrently by other threads may be running again by
    /// the time this returns. Calling it from a job of the same pool
    /// deadlocks.
    pub fn wait_for_completion(&self) {
        let mut queue = self.shared.lock();
        while !queue.jobs.is_empty() || queue.busy != 0 {
            queue = self
                .shared
                .completion
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Configured number of workers, fixed at construction.
    pub fn thread_count(&self) -> usize {
        self.shared.threads
    }

    /// Workers currently running a job. Advisory only.
    pub fn busy_thread_count(&self) -> usize {
        self.shared.lock().busy
    }

    /// Jobs waiting for a worker. Advisory only.
    pub fn queued_job_count(&self) -> usize {
        self.shared.lock().jobs.len()
    }
}

impl Executor for WorkerPool {
    fn submit<F>(&self, job: F)
    where
        F: Send + FnOnce() + 'static,
    {
        WorkerPool::submit(self, job)
    }

    fn wait_for_completion(&self) {
        WorkerPool::wait_for_completion(self)
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.shared.lock();
        f.debug_struct("WorkerPool")
            .field("threads", &self.shared.threads)
            .field("busy", &queue.busy)
            .field("queued", &queue.jobs.len())
            .finish()
    }
}

// destroy threads when pool is dead
impl Drop for WorkerPool {
    fn drop(&mut self) {
        let dropped = self.shared.terminate();
        if dropped != 0 {
            warn!(self.logger, "dropping queued jobs"; "jobs" => dropped);
        }

        // let supervisor stop watch and join the workers
        if self.supervisor_sender.send(Message::Terminate).is_err() {
            error!(self.logger, "supervisor is gone, workers left detached");
        }
        if let Some(supervisor) = self.supervisor.take() {
            if supervisor.join().is_err() {
                error!(self.logger, "supervisor panicked");
            }
        }
        debug!(self.logger, "worker pool stopped");
    }
}

/// Queue and counters, only touched under `Shared::queue`.
struct Queue {
    jobs: VecDeque<Job>,
    busy: usize,
    terminate: bool,
}

pub(super) struct Shared {
    queue: Mutex<Queue>,
    job_available: Condvar,
    completion: Condvar,
    threads: usize,
}

impl Shared {
    fn new(threads: usize) -> Self {
        Shared {
            queue: Mutex::new(Queue {
                jobs: VecDeque::new(),
                busy: 0,
                terminate: false,
            }),
            job_available: Condvar::new(),
            completion: Condvar::new(),
            threads,
        }
    }

    // jobs never run under this mutex
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, job: Job) {
        self.lock().jobs.push_back(job);
        self.job_available.notify_one();
    }

    /// Waits for the next job and marks the caller busy. `None` once the
    /// pool terminates, even if jobs are still queued.
    fn next_job(&self) -> Option<Job> {
        let mut queue = self.lock();
        loop {
            if queue.terminate {
                return None;
            }
            if let Some(job) = queue.jobs.pop_front() {
                queue.busy += 1;
                debug_assert!(
                    queue.busy <= self.threads,
                    "{} busy workers in a pool of {}",
                    queue.busy,
                    self.threads
                );
                return Some(job);
            }
            queue = self
                .job_available
                .wait(queue)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn finish_job(&self) {
        {
            let mut queue = self.lock();
            debug_assert!(queue.busy > 0, "job finished with no busy worker");
            queue.busy = queue.busy.saturating_sub(1);
        }
        self.completion.notify_all();
    }

    /// Raises the terminate flag, wakes every worker and returns the number
    /// of queued jobs that will never run.
    fn terminate(&self) -> usize {
        let dropped: Vec<Job> = {
            let mut queue = self.lock();
            queue.terminate = true;
            queue.jobs.drain(..).collect()
        };
        self.job_available.notify_all();
        // nothing will drain the queue any more
        self.completion.notify_all();
        // captured state is dropped outside the lock
        dropped.len()
    }

    pub(super) fn is_terminating(&self) -> bool {
        self.lock().terminate
    }
}

fn worker_name(prefix: &str, id: usize) -> String {
    format!("{} {}", prefix, id)
}

pub(super) struct Worker {
    id: usize,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    pub(super) fn spawn(
        id: usize,
        prefix: &str,
        shared: Arc<Shared>,
        notifier: Sender<Message>,
        logger: &Logger,
    ) -> io::Result<Worker> {
        let context = WorkerContext {
            id,
            shared,
            notifier,
            logger: logger.new(o!("worker" => id)),
            running: false,
        };
        let thread = thread::Builder::new()
            .name(worker_name(prefix, id))
            .spawn(move || {
                do_job(context);
            })?;

        Ok(Worker {
            id,
            thread: Some(thread),
        })
    }

    pub(super) fn id(&self) -> usize {
        self.id
    }

    /// Waits for the thread to exit. Returns false if it died from a panic.
    pub(super) fn join(&mut self) -> bool {
        match self.thread.take() {
            Some(thread) => thread.join().is_ok(),
            None => true,
        }
    }
}

struct WorkerContext {
    id: usize,
    shared: Arc<Shared>,
    // notify Supervisor
    notifier: Sender<Message>,
    logger: Logger,
    // a job is between next_job and finish_job
    running: bool,
}

impl Drop for WorkerContext {
    fn drop(&mut self) {
        if !thread::panicking() {
            return;
        }
        error!(self.logger, "job panicked, worker is dying");
        if self.running {
            self.shared.finish_job();
        }
        if self.notifier.send(Message::Dead(self.id)).is_err() {
            warn!(self.logger, "supervisor is gone, worker not replaced");
        }
    }
}

// run jobs until the pool terminates
fn do_job(mut context: WorkerContext) {
    debug!(context.logger, "worker started");
    while let Some(job) = context.shared.next_job() {
        context.running = true;
        job();
        context.running = false;
        context.shared.finish_job();
    }
    debug!(context.logger, "worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn reports_thread_count() {
        for &size in &[1, 3, 10] {
            let pool = WorkerPool::new(size).unwrap();
            assert_eq!(pool.thread_count(), size);
            assert_eq!(pool.busy_thread_count(), 0);
            pool.wait_for_completion();
            assert_eq!(pool.busy_thread_count(), 0);
        }
    }

    #[test]
    fn zero_picks_default() {
        let pool = WorkerPool::new(0).unwrap();
        assert!(pool.thread_count() > 0);
    }

    #[test]
    fn names_workers_after_config() {
        let config = PoolConfig {
            threads: 1,
            name: "named".to_string(),
        };
        let pool = WorkerPool::with_config(&config, Logger::root(Discard, o!())).unwrap();
        let (sender, receiver) = unbounded();
        pool.submit(move || {
            let name = thread::current().name().map(str::to_owned);
            sender.send(name).unwrap();
        });
        assert_eq!(receiver.recv().unwrap().as_deref(), Some("named 0"));
    }

    #[test]
    fn drop_discards_queued_jobs() {
        let ran = Arc::new(AtomicUsize::new(0));
        let (gate_sender, gate_receiver) = unbounded::<()>();
        let (started_sender, started_receiver) = unbounded::<()>();

        let pool = WorkerPool::new(1).unwrap();
        pool.submit(move || {
            started_sender.send(()).unwrap();
            gate_receiver.recv().unwrap();
        });
        for _ in 0..5 {
            let ran = Arc::clone(&ran);
            pool.submit(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }
        started_receiver.recv().unwrap();
        assert_eq!(pool.queued_job_count(), 5);

        let shared = Arc::clone(&pool.shared);
        let dropper = thread::spawn(move || drop(pool));
        while !shared.is_terminating() {
            thread::yield_now();
        }
        // the blocked job may only finish once terminate is raised
        gate_sender.send(()).unwrap();
        dropper.join().unwrap();

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(Arc::strong_count(&shared), 1);
    }
}
