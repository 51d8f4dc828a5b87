use std::collections::HashMap;
use std::time::Duration;

/// Spacing rules applied when tasks are admitted
///
/// Holds the default interval and per-host overrides, both in milliseconds.
/// A value `<= 0` means no enforced spacing. Changes only affect tasks
/// admitted after the change; queued tasks keep the delay they were given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Interval applied to hosts without an override
    pub default_interval_ms: i64,

    /// Per-host overrides, keyed by registrable domain
    pub intervals: HashMap<String, i64>,
}

impl ScheduleConfig {
    /// Creates a config with the given default interval and no overrides
    pub fn new(default_interval_ms: i64) -> Self {
        Self {
            default_interval_ms,
            intervals: HashMap::new(),
        }
    }

    /// Inserts or replaces the override for a host
    pub fn set_interval(&mut self, host: impl Into<String>, interval_ms: i64) {
        self.intervals.insert(host.into(), interval_ms);
    }

    /// Replaces the default interval
    pub fn set_default_interval(&mut self, interval_ms: i64) {
        self.default_interval_ms = interval_ms;
    }

    /// Returns the configured interval for a host, override first
    pub fn interval_ms(&self, host: &str) -> i64 {
        self.intervals
            .get(host)
            .copied()
            .unwrap_or(self.default_interval_ms)
    }

    /// Returns the enforced spacing for a host
    ///
    /// Negative values clamp to zero.
    pub fn effective_interval(&self, host: &str) -> Duration {
        Duration::from_millis(self.interval_ms(host).max(0) as u64)
    }
}
