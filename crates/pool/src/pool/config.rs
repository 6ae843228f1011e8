//! Pool configuration types

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for a resource pool
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfig {
    /// Resources created eagerly at construction and kept by `maintain`
    pub min_size: usize,
    /// Hard ceiling on live resources (idle + in use)
    pub max_size: usize,
    /// How long `acquire` waits on a saturated pool. Zero fails fast.
    pub wait_timeout: Duration,
    /// Idle resources older than this are discarded instead of reused
    pub idle_timeout: Option<Duration>,
    /// Resources older than this are discarded instead of reused
    pub max_lifetime: Option<Duration>,
    /// Top the pool back up to `min_size` after a broken resource is discarded
    pub replenish_on_discard: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 10,
            wait_timeout: Duration::from_secs(30),
            idle_timeout: None,
            max_lifetime: None,
            replenish_on_discard: true,
        }
    }
}

impl PoolConfig {
    /// Fixed-size pool: `size` resources created up front, never more.
    #[must_use]
    pub fn fixed(size: usize) -> Self {
        Self {
            min_size: size,
            max_size: size,
            ..Self::default()
        }
    }

    /// Set the wait timeout.
    #[must_use]
    pub fn with_wait_timeout(mut self, wait_timeout: Duration) -> Self {
        self.wait_timeout = wait_timeout;
        self
    }

    /// Validate pool configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(Error::configuration("max_size must be greater than 0"));
        }
        if self.min_size > self.max_size {
            return Err(Error::configuration(format!(
                "min_size ({}) must not exceed max_size ({})",
                self.min_size, self.max_size
            )));
        }
        if self.idle_timeout.is_some_and(|t| t.is_zero()) {
            return Err(Error::configuration(
                "idle_timeout must be greater than zero when set",
            ));
        }
        if self.max_lifetime.is_some_and(|t| t.is_zero()) {
            return Err(Error::configuration(
                "max_lifetime must be greater than zero when set",
            ));
        }
        Ok(())
    }
}
