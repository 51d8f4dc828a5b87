use std::fmt;

/// Lifecycle state of a scheduler
///
/// A scheduler moves `Running -> Stopping -> Stopped` and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulerState {
    /// Accepting new tasks
    Running,

    /// Shutdown requested; new tasks are rejected while the dispatcher winds down
    Stopping,

    /// Dispatcher has exited and cleanup is complete
    Stopped,
}

impl SchedulerState {
    /// Returns true if new tasks may be admitted
    pub fn accepts_tasks(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns true if this is the terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
