//! Integration tests for the scheduler
//!
//! Scheduling tests run on paused tokio time with an in-memory fetcher.
//! HTTP tests use wiremock to stand up a real server.

mod fetcher_tests;
mod scheduler_tests;

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sumi_spider::{Callback, FetchError, Fetcher};
use tokio::time::Instant;
use url::Url;

/// Returns the URL as the body, failing for any URL whose path contains "fail"
pub struct EchoFetcher {
    delay: Duration,
}

impl EchoFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            delay: Duration::ZERO,
        })
    }

    /// A fetcher whose requests take `delay` to complete
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self { delay })
    }
}

#[async_trait]
impl Fetcher for EchoFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if url.path().contains("fail") {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 500,
            });
        }
        Ok(url.to_string())
    }
}

/// Callback bodies with the time they arrived, relative to a start instant
#[derive(Clone)]
pub struct Recorder {
    start: Instant,
    seen: Arc<Mutex<Vec<(String, Duration)>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            seen: Arc::default(),
        }
    }

    pub fn callback(&self) -> impl Callback {
        let recorder = self.clone();
        move |body: String| {
            let elapsed = recorder.start.elapsed();
            recorder.seen.lock().unwrap().push((body, elapsed));
        }
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|(body, _)| body.clone())
            .collect()
    }

    /// Arrival offsets in milliseconds, in arrival order
    pub fn offsets(&self) -> Vec<u128> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|(_, elapsed)| elapsed.as_millis())
            .collect()
    }

    /// Arrival offset of the callback for `body`
    pub fn offset_of(&self, body: &str) -> Option<u128> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .find(|(seen, _)| seen == body)
            .map(|(_, elapsed)| elapsed.as_millis())
    }
}
