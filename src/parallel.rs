//! Bounded worker pool for per-input jobs.
//!
//! Every job here spends its time waiting on an `ffprobe` or `ffmpeg` child
//! process, so the pool size is simply the number of external processes
//! allowed to run at once. Each worker handles whole inputs; nothing is
//! shared between jobs except the progress tracker.

use rayon::{
    ThreadPool, ThreadPoolBuilder,
    iter::{IntoParallelRefIterator, ParallelIterator},
};

use crate::error::StillframeError;

/// A dedicated rayon pool sized to the configured worker count.
pub(crate) struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// Build a pool with exactly `workers` threads (minimum 1).
    pub(crate) fn new(workers: usize) -> Result<Self, StillframeError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|index| format!("stillframe-worker-{index}"))
            .build()?;
        Ok(Self { pool })
    }

    /// Run `job` on every item and return the results in item order.
    pub(crate) fn map<T, R, F>(&self, items: &[T], job: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        self.pool.install(|| items.par_iter().map(&job).collect())
    }

    /// Number of threads in the pool.
    pub(crate) fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }
}
