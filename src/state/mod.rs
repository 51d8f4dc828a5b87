//! State module for scheduler bookkeeping
//!
//! # Components
//!
//! - `ScheduleConfig`: Default interval plus per-host overrides
//! - `HostTable`: Per-host last scheduled slot, locked per host
//! - `SchedulerState`: Running / Stopping / Stopped lifecycle

mod host_table;
mod lifecycle;
mod schedule_config;

// Re-export main types
pub use host_table::{HostState, HostTable};
pub use lifecycle::SchedulerState;
pub use schedule_config::ScheduleConfig;
