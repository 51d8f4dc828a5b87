//! Worker pool: runs task bodies concurrently, bounded by a semaphore
//!
//! A pool can be owned by a single scheduler or shared between several
//! components. Submitted work waits for a permit, so at most `max_workers`
//! bodies run at once.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Default number of concurrent workers
pub const DEFAULT_MAX_WORKERS: usize = 8;

pub struct WorkerPool {
    permits: Arc<Semaphore>,
    tasks: Mutex<JoinSet<()>>,
    max_workers: usize,
    closed: AtomicBool,
}

impl WorkerPool {
    /// Creates a pool running at most `max_workers` bodies at once
    ///
    /// A size of zero is raised to one.
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_workers)),
            tasks: Mutex::new(JoinSet::new()),
            max_workers,
            closed: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submits work for asynchronous execution
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Returns
    ///
    /// * `true` - The work was accepted
    /// * `false` - The pool has been shut down
    pub fn submit<F>(&self, work: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.lock();
        if self.closed.load(Ordering::Acquire) {
            return false;
        }

        reap_finished(&mut tasks);

        let permits = Arc::clone(&self.permits);
        tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            work.await;
        });
        true
    }

    /// Stops accepting work; submitted work still runs to completion
    pub fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!("Worker pool shut down");
        }
    }

    /// Stops accepting work and aborts everything submitted so far
    pub fn shutdown_now(&self) {
        self.closed.store(true, Ordering::Release);
        self.permits.close();

        let mut tasks = self.lock();
        let aborted = tasks.len();
        tasks.abort_all();
        tracing::debug!("Worker pool aborted {} tasks", aborted);
    }

    pub fn is_shutdown(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of submitted bodies that have not finished yet
    pub fn active_count(&self) -> usize {
        let mut tasks = self.lock();
        reap_finished(&mut tasks);
        tasks.len()
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_WORKERS)
    }
}

fn reap_finished(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.try_join_next() {
        if let Err(e) = result {
            if e.is_panic() {
                tracing::warn!("Worker task panicked: {}", e);
            }
        }
    }
}
