//! Scheduler: host-aware, rate-limited delayed task execution
//!
//! This module handles:
//! - Admission of fetch + callback tasks
//! - Per-host spacing via the host schedule table
//! - Interval configuration at runtime
//! - The Running -> Stopping -> Stopped lifecycle and both shutdown modes
//!
//! # Locking
//!
//! Admission takes two locks. The outer admission lock is shared by every
//! `add_task` call and taken exclusively by lifecycle transitions, so no task
//! is admitted halfway through a shutdown. The inner lock is the host's entry
//! in the host table; it covers computing the slot, queueing the task, and
//! recording the slot. Neither critical section performs I/O.

use crate::config::{Config, SchedulerConfig};
use crate::crawler::dispatcher::{self, Dispatch, LoopExit};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::pool::WorkerPool;
use crate::crawler::queue::{DelayQueue, OfferError};
use crate::crawler::task::{Callback, PendingTask};
use crate::state::{HostState, HostTable, ScheduleConfig, SchedulerState};
use crate::url::{parse_task_url, rate_limit_key, registrable_domain};
use crate::{Result, UrlError};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use url::Url;

/// State shared between the scheduler handle and its dispatcher
pub(crate) struct SchedulerShared {
    pub(crate) queue: DelayQueue<Dispatch>,
    pub(crate) hosts: HostTable,
    pub(crate) pool: Arc<WorkerPool>,
    pub(crate) in_flight: TaskTracker,
    /// Cancels dispatched bodies on immediate shutdown
    pub(crate) abandon: CancellationToken,
    /// Stops the dispatch loop without the sentinel
    pub(crate) interrupt: CancellationToken,
    schedule: RwLock<ScheduleConfig>,
    admission: RwLock<()>,
    state: watch::Sender<SchedulerState>,
    fetcher: Arc<dyn Fetcher>,
    owns_pool: bool,
}

impl SchedulerShared {
    fn admission_read(&self) -> RwLockReadGuard<'_, ()> {
        self.admission.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn admission_write(&self) -> RwLockWriteGuard<'_, ()> {
        self.admission.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule(&self) -> RwLockReadGuard<'_, ScheduleConfig> {
        self.schedule.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn schedule_mut(&self) -> RwLockWriteGuard<'_, ScheduleConfig> {
        self.schedule.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Cleanup after the dispatch loop exits, whatever the cause
    pub(crate) async fn finish(&self, exit: LoopExit) {
        {
            let _admission = self.admission_write();
            if self.state() == SchedulerState::Running {
                self.state.send_replace(SchedulerState::Stopping);
            }
            self.queue.close();
        }

        let abandoned = self.queue.drain();
        if exit == LoopExit::Interrupted && !abandoned.is_empty() {
            tracing::warn!("Discarded {} queued tasks after interrupt", abandoned.len());
        }
        drop(abandoned);

        self.in_flight.close();
        self.in_flight.wait().await;

        self.hosts.clear();
        if self.owns_pool {
            self.pool.shutdown();
        }

        self.state.send_replace(SchedulerState::Stopped);
        tracing::info!("Scheduler stopped");
    }
}

/// Host-aware, rate-limited fetch scheduler
///
/// Requests to the same registrable domain are spaced at least the host's
/// effective interval apart; requests to different domains run independently.
/// Each scheduler owns its own host table, queue and dispatcher, so separate
/// instances never interfere.
///
/// Dropping a running scheduler starts a graceful shutdown.
pub struct Scheduler {
    shared: Arc<SchedulerShared>,
}

impl Scheduler {
    /// Creates a scheduler with its own worker pool
    ///
    /// # Arguments
    ///
    /// * `config` - Default interval and sizing
    /// * `fetcher` - Performs the HTTP requests for task bodies
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime; the dispatcher is spawned here.
    pub fn new(config: &SchedulerConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let pool = Arc::new(WorkerPool::new(config.max_workers));
        Self::build(config, fetcher, pool, true)
    }

    /// Creates a scheduler that submits task bodies to an existing pool
    ///
    /// The pool is never shut down by this scheduler. An immediate shutdown
    /// abandons only the bodies this scheduler dispatched.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn with_worker_pool(
        config: &SchedulerConfig,
        fetcher: Arc<dyn Fetcher>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self::build(config, fetcher, pool, false)
    }

    /// Creates a scheduler from a full configuration, applying its interval overrides
    pub fn from_config(config: &Config, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        let scheduler = Self::new(&config.scheduler, fetcher);
        for entry in &config.intervals {
            scheduler.set_interval(&entry.host, entry.interval)?;
        }
        Ok(scheduler)
    }

    fn build(
        config: &SchedulerConfig,
        fetcher: Arc<dyn Fetcher>,
        pool: Arc<WorkerPool>,
        owns_pool: bool,
    ) -> Self {
        let (state, _) = watch::channel(SchedulerState::Running);

        let shared = Arc::new(SchedulerShared {
            queue: DelayQueue::new(config.queue_capacity.max(1)),
            hosts: HostTable::new(),
            pool,
            in_flight: TaskTracker::new(),
            abandon: CancellationToken::new(),
            interrupt: CancellationToken::new(),
            schedule: RwLock::new(ScheduleConfig::new(config.default_interval)),
            admission: RwLock::new(()),
            state,
            fetcher,
            owns_pool,
        });

        tokio::spawn(dispatcher::run(Arc::clone(&shared)));

        tracing::info!(
            "Scheduler started (default interval {}ms, {} workers, queue capacity {})",
            config.default_interval,
            shared.pool.max_workers(),
            shared.queue.capacity()
        );

        Self { shared }
    }

    /// Adds a fetch task
    ///
    /// The task runs no earlier than the host's next free slot: immediately for
    /// a host with no history, otherwise one effective interval after the host's
    /// previous slot.
    ///
    /// # Arguments
    ///
    /// * `url` - The HTTP(S) URL to fetch
    /// * `callback` - Receives the body if the fetch succeeds
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The task was queued
    /// * `Ok(false)` - The scheduler is not running, or the queue is full
    /// * `Err(SpiderError::UrlError)` - The URL is blank or malformed
    pub fn add_task<C: Callback>(&self, url: &str, callback: C) -> Result<bool> {
        let url = parse_task_url(url)?;
        let host = registrable_domain(&url).ok_or(UrlError::MissingDomain)?;
        Ok(self.admit(url, host, Arc::new(callback)))
    }

    fn admit(&self, url: Url, host: String, callback: Arc<dyn Callback>) -> bool {
        let shared = &self.shared;
        let _admission = shared.admission_read();

        if !shared.state().accepts_tasks() {
            tracing::debug!("Rejecting {}: scheduler is {}", url, shared.state());
            return false;
        }

        let interval = shared.schedule().effective_interval(&host);
        let now = Instant::now();
        let fetcher = Arc::clone(&shared.fetcher);

        let admitted = shared.hosts.admit(&host, interval, now, |slot| {
            let delay = slot.saturating_duration_since(now);
            let task = PendingTask::new(url, host.clone(), now, delay, callback, fetcher);
            tracing::debug!("Queueing {} for {} in {:?}", task.url(), task.host(), delay);
            shared.queue.offer(Dispatch::Task(task))
        });

        match admitted {
            Ok(_) => true,
            Err(OfferError::Full(_)) => {
                tracing::warn!(
                    "Delay queue full ({} tasks); rejecting task for {}",
                    shared.queue.capacity(),
                    host
                );
                false
            }
            Err(OfferError::Closed(_)) => false,
        }
    }

    /// Sets the interval for a host, given as a bare host or a URL
    ///
    /// Applies to tasks admitted afterwards; queued tasks keep their delay.
    pub fn set_interval(&self, host_or_url: &str, interval_ms: i64) -> Result<()> {
        let host = rate_limit_key(host_or_url)?;
        tracing::debug!("Interval for {} set to {}ms", host, interval_ms);
        self.shared.schedule_mut().set_interval(host, interval_ms);
        Ok(())
    }

    /// Sets the interval for hosts without an override
    pub fn set_default_interval(&self, interval_ms: i64) {
        tracing::debug!("Default interval set to {}ms", interval_ms);
        self.shared.schedule_mut().set_default_interval(interval_ms);
    }

    /// Returns a copy of the current spacing rules
    pub fn schedule_config(&self) -> ScheduleConfig {
        self.shared.schedule().clone()
    }

    /// Stops accepting tasks
    ///
    /// * `force_now = false` - Queued tasks still run at their slots; the
    ///   scheduler stops once they have all finished.
    /// * `force_now = true` - Queued tasks are discarded and dispatched bodies
    ///   are abandoned. A body whose fetch completed just before the call may
    ///   still be starting its callback when this returns; `await_termination`
    ///   waits for it.
    ///
    /// A graceful shutdown may be escalated by a later `shutdown(true)`; any
    /// other repeated call has no effect.
    pub fn shutdown(&self, force_now: bool) {
        let shared = &self.shared;
        let _admission = shared.admission_write();

        let escalating = match shared.state() {
            SchedulerState::Running => false,
            SchedulerState::Stopping if force_now && !shared.abandon.is_cancelled() => true,
            state => {
                tracing::debug!("Shutdown ignored: scheduler is {}", state);
                return;
            }
        };
        if !escalating {
            shared.state.send_replace(SchedulerState::Stopping);
        }

        if !force_now {
            tracing::info!(
                "Graceful shutdown: {} queued tasks will still run",
                shared.queue.len()
            );
            shared.queue.close();
            return;
        }

        let abandoned = shared.queue.drain();
        tracing::info!(
            "Immediate shutdown: abandoning {} queued tasks",
            abandoned.len()
        );
        drop(abandoned);

        // The queue was drained under the exclusive admission lock and has room
        // for at least one entry, so the sentinel fits unless the dispatcher has
        // already closed the queue on its way out.
        if let Err(OfferError::Closed(_)) = shared.queue.offer(Dispatch::sentinel()) {
            tracing::debug!("Dispatcher already exiting; sentinel not needed");
        }
        shared.queue.close();

        shared.abandon.cancel();
        if shared.owns_pool {
            shared.pool.shutdown_now();
        }
    }

    /// Interrupts the dispatcher
    ///
    /// The loop stops taking tasks, queued tasks are discarded, dispatched
    /// bodies finish, and the scheduler then stops as usual.
    pub fn interrupt(&self) {
        tracing::debug!("Interrupting dispatcher");
        self.shared.interrupt.cancel();
    }

    /// Current lifecycle state
    pub fn state(&self) -> SchedulerState {
        self.shared.state()
    }

    /// Returns true once the scheduler has fully stopped
    pub fn is_shutdown(&self) -> bool {
        self.state().is_terminal()
    }

    /// Waits until the scheduler has fully stopped
    pub async fn await_termination(&self) {
        let mut state = self.shared.state.subscribe();
        let _ = state.wait_for(SchedulerState::is_terminal).await;
    }

    /// Number of entries waiting in the delay queue
    pub fn pending_count(&self) -> usize {
        self.shared.queue.len()
    }

    /// Scheduling record for a host, given as a bare host or a URL
    pub fn host_state(&self, host_or_url: &str) -> Option<HostState> {
        let host = rate_limit_key(host_or_url).ok()?;
        self.shared.hosts.get(&host)
    }

    /// The worker pool task bodies run on
    pub fn worker_pool(&self) -> &Arc<WorkerPool> {
        &self.shared.pool
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if self.state().accepts_tasks() {
            self.shutdown(false);
        }
    }
}
