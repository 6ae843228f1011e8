//! Logger errors

use thiserror::Error;

/// Result type for logger setup
pub type LogResult<T> = Result<T, LogError>;

/// Errors raised while configuring or installing the logger
#[derive(Debug, Error)]
pub enum LogError {
    /// The filter directive could not be parsed
    #[error("invalid log filter: {0}")]
    Filter(String),

    /// A configuration value is invalid
    #[error("invalid log configuration: {0}")]
    Config(String),

    /// A global subscriber is already installed
    #[error("failed to install logger: {0}")]
    Init(String),
}
