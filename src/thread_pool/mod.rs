mod group;
mod pool;
mod supervisor;
pub use group::JobGroup;
pub use pool::WorkerPool;

/// Something that runs jobs and can be waited on.
pub trait Executor {
    /// Queues `job` for execution. Never blocks and never rejects a job.
    fn submit<F>(&self, job: F)
    where
        // since function works in a thread, it must have static lifetime
        F: Send + FnOnce() + 'static;

    /// Blocks until every job submitted so far has returned.
    fn wait_for_completion(&self);
}

pub type Job = Box<dyn Send + FnOnce() + 'static>;

// sent to the supervisor
pub(crate) enum Message {
    Dead(usize),
    Terminate,
}
