//! Dispatcher: the single control loop that drains the delay queue
//!
//! The loop suspends on the queue until the earliest task is due, then hands
//! the task body to the worker pool and goes back to waiting. It exits when:
//! - the sentinel is taken (immediate shutdown)
//! - the queue is closed and empty (graceful shutdown)
//! - the scheduler is interrupted
//!
//! Whatever the cause, the loop finishes with the same cleanup.

use crate::crawler::queue::Delayed;
use crate::crawler::scheduler::SchedulerShared;
use crate::crawler::task::PendingTask;
use std::sync::Arc;
use tokio::time::Instant;

/// An entry in the delay queue
pub(crate) enum Dispatch {
    /// Real work
    Task(PendingTask),

    /// Wakes the dispatcher and ends its loop
    Sentinel { deadline: Instant },
}

impl Dispatch {
    /// A sentinel that is due immediately
    pub(crate) fn sentinel() -> Self {
        Self::Sentinel {
            deadline: Instant::now(),
        }
    }
}

impl Delayed for Dispatch {
    fn deadline(&self) -> Instant {
        match self {
            Self::Task(task) => task.deadline(),
            Self::Sentinel { deadline } => *deadline,
        }
    }
}

/// Why the dispatch loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopExit {
    Sentinel,
    Drained,
    Interrupted,
}

/// Runs the dispatch loop until shutdown, then cleans up
pub(crate) async fn run(shared: Arc<SchedulerShared>) {
    tracing::debug!("Dispatcher started");
    let mut dispatched: u64 = 0;

    let exit = loop {
        let next = tokio::select! {
            biased;
            _ = shared.interrupt.cancelled() => break LoopExit::Interrupted,
            next = shared.queue.take() => next,
        };

        match next {
            Some(Dispatch::Task(task)) => {
                dispatch(&shared, task);
                dispatched += 1;
            }
            Some(Dispatch::Sentinel { .. }) => break LoopExit::Sentinel,
            None => break LoopExit::Drained,
        }
    };

    match exit {
        LoopExit::Interrupted => tracing::warn!(
            "Dispatcher interrupted after {} tasks; {} queued tasks will not run",
            dispatched,
            shared.queue.len()
        ),
        LoopExit::Sentinel => tracing::info!(
            "Dispatcher stopped immediately after {} tasks",
            dispatched
        ),
        LoopExit::Drained => tracing::info!(
            "Dispatcher drained the queue after {} tasks",
            dispatched
        ),
    }

    shared.finish(exit).await;
}

/// Hands a due task to the worker pool
fn dispatch(shared: &SchedulerShared, task: PendingTask) {
    let url = task.url().clone();
    let lateness = Instant::now().saturating_duration_since(task.deadline());
    tracing::debug!("Dispatching {} ({:?} past its slot)", url, lateness);

    let cancel = shared.abandon.clone();
    let body = shared.in_flight.track_future(async move {
        let outcome = task.run(&cancel).await;
        tracing::trace!("Task finished: {:?}", outcome);
    });

    if !shared.pool.submit(body) {
        tracing::warn!("Worker pool is shut down; dropping task for {}", url);
    }
}
