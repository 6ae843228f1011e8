//! # Cistern Pool
//!
//! Bounded pool of reusable, stateful resources (database connections,
//! sockets, sessions).
//!
//! Resources are created through a [`ResourceFactory`], handed out as
//! [`Lease`]s, and validated and reset when they come back so the next
//! holder never sees the previous holder's state. At most
//! [`PoolConfig::max_size`] resources exist at once; callers beyond that
//! wait up to a timeout and then get [`Error::PoolExhausted`].
//!
//! ```no_run
//! use std::time::Duration;
//! use cistern_pool::{Pool, PoolConfig};
//! use cistern_pool::testing::MockFactory;
//!
//! # async fn run() -> cistern_pool::Result<()> {
//! let config = PoolConfig::fixed(5).with_wait_timeout(Duration::from_secs(1));
//! let pool = Pool::new(MockFactory::new("db"), config).await?;
//!
//! let mut conn = pool.acquire().await?;
//! conn.begin_transaction();
//! pool.release(conn).await; // rolled back before anyone else sees it
//!
//! pool.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`SharedCache`] covers the opposite case: immutable values that every
//! caller may share at once.

pub mod cache;
pub mod error;
pub mod events;
pub mod lease;
pub mod pool;
pub mod resource;
pub mod testing;

pub use cache::{CacheStats, SharedCache};
pub use error::{BoxError, Error, Result};
pub use events::{DiscardReason, EventBus, PoolEvent};
pub use lease::Lease;
pub use pool::{Pool, PoolConfig, PoolState, PoolStats, ReleaseOutcome};
pub use resource::{Resource, ResourceFactory};
