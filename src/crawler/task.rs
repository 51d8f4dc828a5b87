//! Pending tasks: one fetch + callback unit with a precomputed delay

use crate::crawler::fetcher::Fetcher;
use crate::crawler::queue::Delayed;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Receives the body of a successful fetch
///
/// Invoked exactly once per task whose fetch succeeded, on a worker task.
/// Never invoked when the fetch fails. Any `Fn(String)` closure qualifies.
pub trait Callback: Send + Sync + 'static {
    fn exec(&self, result: String);
}

impl<F> Callback for F
where
    F: Fn(String) + Send + Sync + 'static,
{
    fn exec(&self, result: String) {
        self(result)
    }
}

/// How a task body finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Fetch succeeded and the callback returned
    Completed,

    /// Fetch failed; the callback was skipped
    FetchFailed,

    /// The callback panicked; the panic was contained
    CallbackPanicked,

    /// The scheduler abandoned the task before the callback ran
    Cancelled,
}

/// A queued unit of work
///
/// Immutable once created. Its deadline is `created_at + scheduled_delay`.
pub struct PendingTask {
    url: Url,
    host: String,
    created_at: Instant,
    scheduled_delay: Duration,
    callback: Arc<dyn Callback>,
    fetcher: Arc<dyn Fetcher>,
}

impl PendingTask {
    /// Creates a new task
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    /// * `host` - The rate-limiting key the task was admitted under
    /// * `created_at` - Admission instant
    /// * `scheduled_delay` - Time from admission until the task may run
    /// * `callback` - Receives the fetched body
    /// * `fetcher` - Performs the fetch
    pub fn new(
        url: Url,
        host: String,
        created_at: Instant,
        scheduled_delay: Duration,
        callback: Arc<dyn Callback>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            url,
            host,
            created_at,
            scheduled_delay,
            callback,
            fetcher,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn scheduled_delay(&self) -> Duration {
        self.scheduled_delay
    }

    /// Time left before the task is eligible to run
    pub fn remaining_delay(&self, now: Instant) -> Duration {
        self.deadline().saturating_duration_since(now)
    }

    /// Runs the fetch and hands the body to the callback
    ///
    /// Fetch errors and callback panics are logged and reported through the
    /// returned outcome; they never propagate to the caller. If `cancel` fires
    /// before the callback starts, the callback is not invoked.
    pub async fn run(self, cancel: &CancellationToken) -> TaskOutcome {
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Task for {} abandoned during fetch", self.url);
                return TaskOutcome::Cancelled;
            }
            result = self.fetcher.fetch(&self.url) => result,
        };

        let body = match fetched {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Request to {} failed: {}", self.url, e);
                return TaskOutcome::FetchFailed;
            }
        };

        if cancel.is_cancelled() {
            tracing::debug!("Task for {} abandoned before callback", self.url);
            return TaskOutcome::Cancelled;
        }

        tracing::debug!("Fetched {} ({} bytes)", self.url, body.len());

        let callback = Arc::clone(&self.callback);
        match panic::catch_unwind(AssertUnwindSafe(move || callback.exec(body))) {
            Ok(()) => TaskOutcome::Completed,
            Err(payload) => {
                tracing::error!(
                    "Callback for {} panicked: {}",
                    self.url,
                    panic_message(payload.as_ref())
                );
                TaskOutcome::CallbackPanicked
            }
        }
    }
}

impl Delayed for PendingTask {
    fn deadline(&self) -> Instant {
        self.created_at + self.scheduled_delay
    }
}

impl fmt::Debug for PendingTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTask")
            .field("url", &self.url.as_str())
            .field("host", &self.host)
            .field("scheduled_delay", &self.scheduled_delay)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
