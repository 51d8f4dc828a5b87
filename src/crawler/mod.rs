//! Crawler module: delayed, host-aware execution of fetch tasks
//!
//! This module contains the scheduling machinery, including:
//! - HTTP fetching behind the `Fetcher` trait
//! - Pending tasks and their callbacks
//! - The deadline-ordered delay queue
//! - The dispatcher that hands due tasks to the worker pool
//! - The `Scheduler` facade tying them together

mod dispatcher;
mod fetcher;
mod pool;
mod queue;
mod scheduler;
mod task;

pub use fetcher::{build_http_client, fetch_url, Fetcher, HttpFetcher};
pub use pool::{WorkerPool, DEFAULT_MAX_WORKERS};
pub use queue::{DelayQueue, Delayed, OfferError};
pub use scheduler::Scheduler;
pub use task::{Callback, PendingTask, TaskOutcome};

pub use crate::state::SchedulerState;
