//! Error types for pool operations
use thiserror::Error;

/// Boxed error produced by collaborators (factories and resources).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for pool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to pool callers.
///
/// Failures that only affect pool bookkeeping (a broken resource coming back
/// on release, a failing `close`) are logged and emitted as events instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Pool configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
    },

    /// The factory could not produce a resource
    #[error("Failed to create resource for pool '{pool}'")]
    CreationFailed {
        /// The pool name
        pool: String,
        /// The factory error
        #[source]
        source: BoxError,
    },

    /// No resource became available within the wait timeout
    #[error("Pool '{pool}' exhausted: {in_use}/{max_size} in use after waiting {waited_ms}ms")]
    PoolExhausted {
        /// The pool name
        pool: String,
        /// Resources checked out when the wait gave up
        in_use: usize,
        /// Maximum pool size
        max_size: usize,
        /// How long the caller waited, in milliseconds
        waited_ms: u64,
    },

    /// The pool has been shut down
    #[error("Pool '{pool}' is closed")]
    PoolClosed {
        /// The pool name
        pool: String,
    },

    /// The caller's cancellation token fired while waiting
    #[error("Acquire from pool '{pool}' was cancelled")]
    Cancelled {
        /// The pool name
        pool: String,
    },

    /// One or more resources failed to close during shutdown
    #[error("Shutdown of pool '{pool}' finished with {} close failure(s)", failures.len())]
    Shutdown {
        /// The pool name
        pool: String,
        /// `(resource_id, error)` pairs for every failed close
        failures: Vec<(String, BoxError)>,
    },
}

impl Error {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn creation_failed(pool: &str, source: BoxError) -> Self {
        Self::CreationFailed {
            pool: pool.to_string(),
            source,
        }
    }

    pub(crate) fn closed(pool: &str) -> Self {
        Self::PoolClosed {
            pool: pool.to_string(),
        }
    }

    /// Check if this error is retryable
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. })
    }

    /// Get the pool name associated with this error (if any)
    #[must_use]
    pub fn pool_name(&self) -> Option<&str> {
        match self {
            Self::Configuration { .. } => None,
            Self::CreationFailed { pool, .. }
            | Self::PoolExhausted { pool, .. }
            | Self::PoolClosed { pool }
            | Self::Cancelled { pool }
            | Self::Shutdown { pool, .. } => Some(pool),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_exhaustion_is_retryable() {
        let exhausted = Error::PoolExhausted {
            pool: "db".into(),
            in_use: 2,
            max_size: 2,
            waited_ms: 100,
        };
        assert!(exhausted.is_retryable());
        assert!(!Error::closed("db").is_retryable());
        assert!(!Error::configuration("bad").is_retryable());
    }

    #[test]
    fn pool_name_is_reported() {
        assert_eq!(Error::closed("db").pool_name(), Some("db"));
        assert_eq!(Error::configuration("bad").pool_name(), None);
    }

    #[test]
    fn creation_failure_keeps_source() {
        use std::error::Error as _;

        let err = Error::creation_failed("db", "connection refused".into());
        assert_eq!(err.to_string(), "Failed to create resource for pool 'db'");
        assert_eq!(
            err.source().map(ToString::to_string).as_deref(),
            Some("connection refused")
        );
    }
}
