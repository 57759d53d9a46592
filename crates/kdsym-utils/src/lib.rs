//! # kdsym Utilities
//!
//! Shared utilities, logging, and config for kdsym.
//!
//! This crate provides common functionality used across the kdsym workspace:
//! logging infrastructure built on `tracing`, and the JSON configuration read
//! by the filesystem symbol host.

pub mod config;
pub mod logging;

pub use config::{ConfigError, HostConfig, ModuleConfig};
// Re-export commonly used logging functions for convenience
pub use logging::{init_logging, init_logging_with, verbosity_level, LogFormat, LogSettings, LoggingError, LoggingGuard};
pub use tracing::{debug, error, info, trace, warn};
