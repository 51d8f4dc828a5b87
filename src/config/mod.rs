//! Configuration module for Sumi-Spider
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use sumi_spider::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("spider.toml")).unwrap();
//! println!("Default interval: {}ms", config.scheduler.default_interval);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, IntervalEntry, SchedulerConfig, UserAgentConfig, DEFAULT_INTERVAL_MS,
    DEFAULT_QUEUE_CAPACITY,
};

// Re-export parser functions
pub use parser::{load_config, parse_config};
