use serde::Deserialize;

/// Default spacing between requests to the same host (milliseconds)
pub const DEFAULT_INTERVAL_MS: i64 = 1000;

/// Default delay queue bound
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Main configuration structure for Sumi-Spider
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default, rename = "interval")]
    pub intervals: Vec<IntervalEntry>,
}

/// Scheduler behavior configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Minimum time between requests to the same host (milliseconds, <= 0 disables)
    #[serde(rename = "default-interval")]
    pub default_interval: i64,

    /// Maximum number of task bodies running at once
    #[serde(rename = "max-workers")]
    pub max_workers: usize,

    /// Maximum number of tasks waiting in the delay queue
    #[serde(rename = "queue-capacity")]
    pub queue_capacity: usize,
}

impl SchedulerConfig {
    /// Creates a config with the given default interval and default sizes
    pub fn with_interval(default_interval: i64) -> Self {
        Self {
            default_interval,
            ..Self::default()
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_interval: DEFAULT_INTERVAL_MS,
            max_workers: crate::crawler::DEFAULT_MAX_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn user_agent_string(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Per-host interval override
#[derive(Debug, Clone, Deserialize)]
pub struct IntervalEntry {
    /// Host name or URL; resolved to its registrable domain
    pub host: String,

    /// Minimum time between requests to this host (milliseconds, <= 0 disables)
    pub interval: i64,
}
