//! Testing utilities for pool consumers
//!
//! [`MockFactory`] produces [`MockResource`]s that behave like a database
//! connection: they carry transaction state that `reset` rolls back, and
//! every lifecycle call is counted in state shared by all clones of the
//! factory.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::BoxError;
use crate::resource::{Resource, ResourceFactory};

#[derive(Default)]
struct Shared {
    created: AtomicU64,
    resets: AtomicU64,
    /// Successful creations allowed before every further create fails.
    fail_after: Mutex<Option<u64>>,
    fail_reset: AtomicBool,
    fail_close: AtomicBool,
    invalid: Mutex<HashSet<String>>,
    closed: Mutex<Vec<String>>,
    create_delay: Mutex<Option<Duration>>,
    validate_delay: Mutex<Option<Duration>>,
    reset_delay: Mutex<Option<Duration>>,
}

/// Factory whose resources record every lifecycle call.
#[derive(Clone)]
pub struct MockFactory {
    name: String,
    shared: Arc<Shared>,
}

impl MockFactory {
    /// Create a factory; resources are named `{name}-1`, `{name}-2`, ...
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(Shared::default()),
        }
    }

    /// Sleep this long inside every `create`.
    #[must_use]
    pub fn with_create_delay(self, delay: Duration) -> Self {
        *self.shared.create_delay.lock() = Some(delay);
        self
    }

    /// Sleep this long inside every `is_valid`.
    #[must_use]
    pub fn with_validate_delay(self, delay: Duration) -> Self {
        *self.shared.validate_delay.lock() = Some(delay);
        self
    }

    /// Sleep this long inside every `reset`.
    #[must_use]
    pub fn with_reset_delay(self, delay: Duration) -> Self {
        *self.shared.reset_delay.lock() = Some(delay);
        self
    }

    /// Allow `successes` more creations, then fail every later one.
    pub fn fail_after(&self, successes: u64) {
        let created = self.created();
        *self.shared.fail_after.lock() = Some(created + successes);
    }

    /// Let creations succeed again.
    pub fn heal(&self) {
        *self.shared.fail_after.lock() = None;
    }

    /// Make every `reset` fail (or succeed again).
    pub fn fail_resets(&self, fail: bool) {
        self.shared.fail_reset.store(fail, Ordering::SeqCst);
    }

    /// Make every `close` fail (or succeed again).
    pub fn fail_closes(&self, fail: bool) {
        self.shared.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Mark the resource with this id as broken.
    pub fn invalidate(&self, id: &str) {
        self.shared.invalid.lock().insert(id.to_string());
    }

    /// Resources created so far.
    pub fn created(&self) -> u64 {
        self.shared.created.load(Ordering::SeqCst)
    }

    /// Successful resets so far.
    pub fn resets(&self) -> u64 {
        self.shared.resets.load(Ordering::SeqCst)
    }

    /// `close` calls so far, including failed ones.
    pub fn closed(&self) -> usize {
        self.shared.closed.lock().len()
    }

    /// Ids passed to `close`, in call order.
    pub fn closed_ids(&self) -> Vec<String> {
        self.shared.closed.lock().clone()
    }
}

impl ResourceFactory for MockFactory {
    type Resource = MockResource;

    fn name(&self) -> &str {
        &self.name
    }

    async fn create(&self) -> Result<MockResource, BoxError> {
        let delay = *self.shared.create_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let limit = *self.shared.fail_after.lock();
        let n = {
            let created = self.shared.created.load(Ordering::SeqCst);
            if limit.is_some_and(|limit| created >= limit) {
                return Err(format!("{}: connection refused", self.name).into());
            }
            self.shared.created.fetch_add(1, Ordering::SeqCst) + 1
        };

        Ok(MockResource {
            id: format!("{}-{n}", self.name),
            in_transaction: false,
            shared: Arc::clone(&self.shared),
        })
    }
}

/// Resource produced by [`MockFactory`].
pub struct MockResource {
    id: String,
    in_transaction: bool,
    shared: Arc<Shared>,
}

impl MockResource {
    /// Open a transaction; left open it is state the next holder must not see.
    pub fn begin_transaction(&mut self) {
        self.in_transaction = true;
    }

    /// Whether a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Mark this resource as broken.
    pub fn invalidate(&self) {
        self.shared.invalid.lock().insert(self.id.clone());
    }
}

impl std::fmt::Debug for MockResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockResource")
            .field("id", &self.id)
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

impl Resource for MockResource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn is_valid(&self) -> bool {
        let delay = *self.shared.validate_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        !self.shared.invalid.lock().contains(&self.id)
    }

    async fn reset(&mut self) -> Result<(), BoxError> {
        let delay = *self.shared.reset_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.shared.fail_reset.load(Ordering::SeqCst) {
            return Err("rollback failed".into());
        }
        self.in_transaction = false;
        self.shared.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(self) -> Result<(), BoxError> {
        self.shared.closed.lock().push(self.id.clone());
        if self.shared.fail_close.load(Ordering::SeqCst) {
            return Err(format!("{}: socket already closed", self.id).into());
        }
        Ok(())
    }
}
