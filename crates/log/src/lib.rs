//! # cistern-log
//!
//! Logging setup shared by the cistern binaries: an `EnvFilter` plus one
//! `tracing-subscriber` fmt layer in pretty, compact or JSON form.
//!
//! ```no_run
//! let _guard = cistern_log::init()?;
//! tracing::info!(pool = "db", "ready");
//! # Ok::<(), cistern_log::LogError>(())
//! ```
//!
//! Libraries never call these; they only emit `tracing` events.

mod builder;
mod config;
mod error;

pub use builder::{LoggerBuilder, LoggerGuard};
pub use config::{Config, DisplayConfig, Format};
pub use error::{LogError, LogResult};

/// Install the logger configured from the environment.
///
/// # Errors
/// See [`LoggerBuilder::build`].
pub fn init() -> LogResult<LoggerGuard> {
    init_with(Config::from_env())
}

/// Install the logger with an explicit configuration.
///
/// # Errors
/// See [`LoggerBuilder::build`].
pub fn init_with(config: Config) -> LogResult<LoggerGuard> {
    LoggerBuilder::from_config(config).build()
}
