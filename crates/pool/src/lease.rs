//! RAII lease over a checked-out resource

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::OwnedSemaphorePermit;
use tokio::time::Instant;

use crate::events::DiscardReason;
use crate::pool::{Entry, PoolInner, ReleaseOutcome};
use crate::resource::{Resource, ResourceFactory};

/// Exclusive ownership of one pooled resource.
///
/// Dropping the lease releases the resource in a background Tokio task.
/// Call [`Lease::release`] to wait for validation and reset instead, or
/// [`Lease::detach`] to take the resource out of the pool for good.
pub struct Lease<F: ResourceFactory> {
    entry: Option<Entry<F::Resource>>,
    permit: Option<OwnedSemaphorePermit>,
    pool: Arc<PoolInner<F>>,
    acquired_at: Instant,
}

impl<F: ResourceFactory> Lease<F> {
    pub(crate) fn new(
        entry: Entry<F::Resource>,
        permit: OwnedSemaphorePermit,
        pool: Arc<PoolInner<F>>,
    ) -> Self {
        Self {
            entry: Some(entry),
            permit: Some(permit),
            pool,
            acquired_at: Instant::now(),
        }
    }

    pub(crate) fn pool(&self) -> &Arc<PoolInner<F>> {
        &self.pool
    }

    /// Identity of the leased resource.
    pub fn id(&self) -> &str {
        self.resource().id()
    }

    /// Time since the lease was handed out.
    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }

    /// Return the resource to its pool and wait until it has been validated
    /// and reset (or closed).
    ///
    /// The release runs on its own task: dropping this future stops the
    /// wait, not the release.
    pub async fn release(mut self) -> ReleaseOutcome {
        let held_for = self.held_for();
        // Both are only taken by consuming methods or drop.
        let (Some(entry), Some(permit)) = (self.entry.take(), self.permit.take()) else {
            unreachable!("lease already released")
        };
        let pool = Arc::clone(&self.pool);
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return pool.release(entry, permit, held_for).await;
        };
        match handle
            .spawn(async move { pool.release(entry, permit, held_for).await })
            .await
        {
            Ok(outcome) => outcome,
            Err(error) if error.is_panic() => std::panic::resume_unwind(error.into_panic()),
            // Runtime shutting down; the key was cleared when the task was dropped.
            Err(_) => ReleaseOutcome::Discarded(DiscardReason::Shutdown),
        }
    }

    /// Remove the resource from the pool and take ownership of it.
    ///
    /// The slot is freed immediately; closing the resource becomes the
    /// caller's job.
    #[must_use]
    pub fn detach(mut self) -> F::Resource {
        match (self.entry.take(), self.permit.take()) {
            (Some(entry), Some(permit)) => {
                self.pool.detach(&entry, permit);
                entry.resource
            }
            _ => unreachable!("lease already released"),
        }
    }

    fn resource(&self) -> &F::Resource {
        match &self.entry {
            Some(entry) => &entry.resource,
            None => unreachable!("lease used after release"),
        }
    }
}

impl<F: ResourceFactory> std::ops::Deref for Lease<F> {
    type Target = F::Resource;

    fn deref(&self) -> &F::Resource {
        self.resource()
    }
}

impl<F: ResourceFactory> std::ops::DerefMut for Lease<F> {
    fn deref_mut(&mut self) -> &mut F::Resource {
        match &mut self.entry {
            Some(entry) => &mut entry.resource,
            None => unreachable!("lease used after release"),
        }
    }
}

impl<F: ResourceFactory> Drop for Lease<F> {
    fn drop(&mut self) {
        let (Some(entry), Some(permit)) = (self.entry.take(), self.permit.take()) else {
            return;
        };
        let held_for = self.held_for();
        let pool = Arc::clone(&self.pool);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                drop(handle.spawn(async move {
                    pool.release(entry, permit, held_for).await;
                }));
            }
            Err(_) => {
                // No runtime to validate or close on; the resource is dropped
                // and only its slot is given back.
                tracing::warn!(
                    pool = %pool.name(),
                    resource_id = entry.resource.id(),
                    "lease dropped outside a Tokio runtime, discarding resource"
                );
                pool.detach(&entry, permit);
            }
        }
    }
}

impl<F: ResourceFactory> std::fmt::Debug for Lease<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("pool", &self.pool.name())
            .field("resource_id", &self.entry.as_ref().map(|e| e.resource.id()))
            .finish()
    }
}
