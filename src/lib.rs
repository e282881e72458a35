//! Two independent concurrency primitives:
//!
//! - [`ReadWriteLock`] (and the data-owning [`FairRwLock`]), a shared/exclusive
//!   lock where a waiting writer blocks new readers.
//! - [`WorkerPool`], a fixed set of threads draining a FIFO job queue, and
//!   [`JobGroup`], which waits for a subset of the pool's jobs.
pub mod config;
pub mod error;
pub mod rwlock;
pub mod thread_pool;

pub use config::PoolConfig;
pub use error::{Error, ErrorKind, Result};
pub use rwlock::{FairRwLock, LockStatus, ReadScope, ReadWriteLock, WriteScope};
pub use thread_pool::{Executor, Job, JobGroup, WorkerPool};
