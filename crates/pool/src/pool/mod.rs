//! Bounded resource pool.
//!
//! `Pool<F>` creates resources through a [`ResourceFactory`], hands them out
//! as [`Lease`]s, and validates, resets or closes them through the
//! [`Resource`] trait when they come back.
//!
//! Two pieces of shared state:
//! - a semaphore whose permits are the checkout slots. A lease owns one
//!   permit, so at most `max_size` resources are ever checked out and a
//!   release wakes one waiter. Closing the semaphore on shutdown wakes all
//!   waiters at once.
//! - a single mutex around the idle queue, the leased set and every counter.
//!   It is never held across an `.await`.

pub mod config;

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::error::{BoxError, Error, Result};
use crate::events::{DiscardReason, EventBus, PoolEvent};
use crate::lease::Lease;
use crate::resource::{Resource, ResourceFactory};

pub use config::PoolConfig;

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// A resource plus the bookkeeping the pool keeps about it.
pub(crate) struct Entry<R> {
    pub(crate) resource: R,
    /// Pool-assigned serial; membership in the leased set is tracked by key.
    pub(crate) key: u64,
    created_at: Instant,
    idle_since: Instant,
}

impl<R> Entry<R> {
    fn new(resource: R, key: u64) -> Self {
        let now = Instant::now();
        Self {
            resource,
            key,
            created_at: now,
            idle_since: now,
        }
    }
}

// ---------------------------------------------------------------------------
// PoolState / PoolStats / ReleaseOutcome
// ---------------------------------------------------------------------------

/// Lifecycle of the pool itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PoolState {
    /// Serving acquires and releases.
    Open,
    /// `shutdown` ran; acquires are rejected, outstanding leases may still
    /// be released.
    Closing,
    /// Every resource has been closed.
    Closed,
}

/// Point-in-time pool statistics, taken under one lock.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PoolStats {
    /// Pool lifecycle state.
    pub state: PoolState,
    /// Live resources (`idle + in_use`).
    pub total: usize,
    /// Resources owned by the pool and available.
    pub idle: usize,
    /// Resources currently checked out.
    pub in_use: usize,
    /// Configured ceiling.
    pub max_size: usize,
    /// Resources ever created.
    pub created: u64,
    /// Resources ever closed or detached.
    pub destroyed: u64,
    /// Successful acquires.
    pub acquisitions: u64,
    /// Completed releases (returned or discarded).
    pub releases: u64,
    /// Acquires that gave up with `PoolExhausted`.
    pub exhausted: u64,
}

/// What happened to a resource handed back to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Reset and returned to the idle set.
    Returned,
    /// Closed and removed from the pool.
    Discarded(DiscardReason),
    /// The lease belongs to a different pool and was routed back to it.
    Foreign,
}

// ---------------------------------------------------------------------------
// Pool internals
// ---------------------------------------------------------------------------

struct State<R> {
    phase: PoolState,
    idle: VecDeque<Entry<R>>,
    leased: HashSet<u64>,
    /// Creations in flight; counted against `max_size` before they land.
    creating: usize,
    next_key: u64,
    created: u64,
    destroyed: u64,
    acquisitions: u64,
    releases: u64,
    exhausted: u64,
}

impl<R> State<R> {
    fn live(&self) -> usize {
        self.idle.len() + self.leased.len() + self.creating
    }

    /// Moves `Closing` to `Closed` once nothing is checked out or being
    /// created. Returns true on the transition.
    fn settle_closing(&mut self) -> bool {
        if self.phase == PoolState::Closing && self.leased.is_empty() && self.creating == 0 {
            self.phase = PoolState::Closed;
            return true;
        }
        false
    }
}

/// A counted slot in `State::creating`, given back on drop unless settled.
struct Reservation<'a, F: ResourceFactory> {
    inner: &'a PoolInner<F>,
    key: u64,
    armed: bool,
}

impl<F: ResourceFactory> Reservation<'_, F> {
    fn settle(mut self, state: &mut State<F::Resource>) {
        state.creating -= 1;
        self.armed = false;
    }
}

impl<F: ResourceFactory> Drop for Reservation<'_, F> {
    fn drop(&mut self) {
        if self.armed {
            let closed = {
                let mut state = self.inner.state.lock();
                state.creating -= 1;
                state.settle_closing()
            };
            if closed {
                self.inner.emit_closed();
            }
        }
    }
}

/// An idle entry taken out for validation. Goes back to the front of the
/// idle queue on drop unless claimed, so an abandoned acquire loses nothing.
struct Borrowed<F: ResourceFactory> {
    inner: Arc<PoolInner<F>>,
    entry: Option<Entry<F::Resource>>,
}

impl<F: ResourceFactory> Borrowed<F> {
    fn entry(&self) -> &Entry<F::Resource> {
        match &self.entry {
            Some(entry) => entry,
            None => unreachable!("borrowed entry already claimed"),
        }
    }

    fn claim(mut self) -> Entry<F::Resource> {
        match self.entry.take() {
            Some(entry) => entry,
            None => unreachable!("borrowed entry already claimed"),
        }
    }
}

impl<F: ResourceFactory> Drop for Borrowed<F> {
    fn drop(&mut self) {
        let Some(entry) = self.entry.take() else {
            return;
        };
        let entry = {
            let mut state = self.inner.state.lock();
            if state.phase == PoolState::Open {
                state.idle.push_front(entry);
                return;
            }
            entry
        };
        self.inner.spawn_retire(entry, DiscardReason::Shutdown);
    }
}

/// A key still in the leased set while its release runs. If the release
/// never reaches its bookkeeping the key is dropped from the set here.
struct Returning<'a, F: ResourceFactory> {
    inner: &'a PoolInner<F>,
    key: u64,
    armed: bool,
}

impl<F: ResourceFactory> Returning<'_, F> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<F: ResourceFactory> Drop for Returning<'_, F> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let closed = {
            let mut state = self.inner.state.lock();
            if state.leased.remove(&self.key) {
                state.destroyed += 1;
            }
            state.settle_closing()
        };
        tracing::warn!(pool = %self.inner.name, key = self.key, "release abandoned, resource dropped unclosed");
        if closed {
            self.inner.emit_closed();
        }
    }
}

/// Shared pool state, referenced by the pool handle and by every lease.
pub(crate) struct PoolInner<F: ResourceFactory> {
    name: String,
    factory: F,
    config: PoolConfig,
    state: Mutex<State<F::Resource>>,
    /// One permit per checkout slot.
    slots: Arc<Semaphore>,
    events: Option<Arc<EventBus>>,
}

impl<F: ResourceFactory> PoolInner<F> {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    fn emit(&self, event: PoolEvent) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }

    fn emit_closed(&self) {
        tracing::info!(pool = %self.name, "pool closed");
        self.emit(PoolEvent::Closed {
            pool: self.name.clone(),
        });
    }

    fn exhausted(&self, waited: Duration) -> Error {
        let in_use = {
            let mut state = self.state.lock();
            state.exhausted += 1;
            state.leased.len()
        };
        tracing::debug!(pool = %self.name, in_use, waited_ms = waited.as_millis() as u64, "pool exhausted");
        self.emit(PoolEvent::Exhausted {
            pool: self.name.clone(),
            waited,
        });
        Error::PoolExhausted {
            pool: self.name.clone(),
            in_use,
            max_size: self.config.max_size,
            waited_ms: waited.as_millis() as u64,
        }
    }

    /// Reserve a creation if the pool stays below `limit` live resources.
    fn reserve(&self, limit: usize) -> Result<Option<Reservation<'_, F>>> {
        let mut state = self.state.lock();
        if state.phase != PoolState::Open {
            return Err(Error::closed(&self.name));
        }
        if state.live() >= limit {
            return Ok(None);
        }
        state.creating += 1;
        state.next_key += 1;
        Ok(Some(Reservation {
            inner: self,
            key: state.next_key,
            armed: true,
        }))
    }

    async fn create(&self, key: u64) -> Result<Entry<F::Resource>> {
        match self.factory.create().await {
            Ok(resource) => {
                self.state.lock().created += 1;
                tracing::debug!(pool = %self.name, resource_id = resource.id(), "created resource");
                self.emit(PoolEvent::Created {
                    pool: self.name.clone(),
                    resource_id: resource.id().to_string(),
                });
                Ok(Entry::new(resource, key))
            }
            Err(source) => {
                tracing::warn!(pool = %self.name, error = %source, "resource creation failed");
                self.emit(PoolEvent::CreationFailed {
                    pool: self.name.clone(),
                    error: source.to_string(),
                });
                Err(Error::creation_failed(&self.name, source))
            }
        }
    }

    fn expiry(&self, entry: &Entry<F::Resource>) -> Option<DiscardReason> {
        if self
            .config
            .max_lifetime
            .is_some_and(|max| entry.created_at.elapsed() > max)
        {
            return Some(DiscardReason::Expired);
        }
        if self
            .config
            .idle_timeout
            .is_some_and(|max| entry.idle_since.elapsed() > max)
        {
            return Some(DiscardReason::IdleTimeout);
        }
        None
    }

    /// Close a resource that is no longer in any set and count it destroyed.
    async fn retire(
        &self,
        entry: Entry<F::Resource>,
        reason: DiscardReason,
    ) -> std::result::Result<(), (String, BoxError)> {
        let resource_id = entry.resource.id().to_string();
        let closed = entry.resource.close().await;
        self.state.lock().destroyed += 1;
        match &closed {
            Ok(()) => {
                tracing::debug!(pool = %self.name, resource_id = %resource_id, %reason, "closed resource");
            }
            Err(error) => {
                tracing::warn!(
                    pool = %self.name,
                    resource_id = %resource_id,
                    %reason,
                    %error,
                    "failed to close resource"
                );
            }
        }
        self.emit(PoolEvent::Discarded {
            pool: self.name.clone(),
            resource_id: resource_id.clone(),
            reason,
        });
        closed.map_err(|error| (resource_id, error))
    }

    /// [`retire`](Self::retire) on a task of its own, awaited. The close
    /// finishes even if the caller stops waiting.
    async fn retire_detached(
        self: &Arc<Self>,
        entry: Entry<F::Resource>,
        reason: DiscardReason,
    ) -> std::result::Result<(), (String, BoxError)> {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return self.retire(entry, reason).await;
        };
        let resource_id = entry.resource.id().to_string();
        let inner = Arc::clone(self);
        match handle
            .spawn(async move { inner.retire(entry, reason).await })
            .await
        {
            Ok(closed) => closed,
            Err(error) if error.is_panic() => std::panic::resume_unwind(error.into_panic()),
            Err(error) => Err((resource_id, Box::new(error))),
        }
    }

    /// Close `entry` in the background. Without a runtime it is only counted
    /// as destroyed and dropped.
    fn spawn_retire(self: &Arc<Self>, entry: Entry<F::Resource>, reason: DiscardReason) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(self);
                drop(handle.spawn(async move {
                    let _ = inner.retire(entry, reason).await;
                    inner.after_removal();
                }));
            }
            Err(_) => {
                self.state.lock().destroyed += 1;
                tracing::warn!(
                    pool = %self.name,
                    resource_id = entry.resource.id(),
                    %reason,
                    "no runtime to close resource, dropping it"
                );
            }
        }
    }

    /// Create resources into the idle set until `min_size` live resources
    /// exist. Each creation holds a checkout slot so it can never push the
    /// pool past `max_size`.
    async fn fill_to_min(self: &Arc<Self>) -> Result<usize> {
        let mut filled = 0;
        loop {
            let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() else {
                break;
            };
            let reservation = match self.reserve(self.config.min_size) {
                Ok(Some(reservation)) => reservation,
                Ok(None) | Err(Error::PoolClosed { .. }) => break,
                Err(other) => return Err(other),
            };
            let mut entry = self.create(reservation.key).await?;
            let retired = {
                let mut state = self.state.lock();
                reservation.settle(&mut state);
                if state.phase == PoolState::Open {
                    entry.idle_since = Instant::now();
                    state.idle.push_back(entry);
                    None
                } else {
                    Some(entry)
                }
            };
            drop(permit);
            match retired {
                None => filled += 1,
                Some(entry) => {
                    let _ = self.retire_detached(entry, DiscardReason::Shutdown).await;
                    self.after_removal();
                    break;
                }
            }
        }
        Ok(filled)
    }

    fn after_removal(&self) {
        if self.state.lock().settle_closing() {
            self.emit_closed();
        }
    }

    fn spawn_replenish(self: &Arc<Self>) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let inner = Arc::clone(self);
        drop(handle.spawn(async move {
            match inner.fill_to_min().await {
                Ok(0) => {}
                Ok(created) => {
                    tracing::debug!(pool = %inner.name, created, "replenished pool");
                }
                Err(error) => {
                    tracing::warn!(pool = %inner.name, %error, "failed to replenish pool");
                }
            }
        }));
    }

    /// Take back a checked-out resource: validate, reset, then return it to
    /// idle or close it.
    pub(crate) async fn release(
        self: &Arc<Self>,
        mut entry: Entry<F::Resource>,
        permit: OwnedSemaphorePermit,
        held_for: Duration,
    ) -> ReleaseOutcome {
        let resource_id = entry.resource.id().to_string();
        let mut returning = Returning {
            inner: self.as_ref(),
            key: entry.key,
            armed: true,
        };
        let open = self.state.lock().phase == PoolState::Open;
        // Once the pool is closing every returned resource is closed as is.
        let failure = if !open {
            None
        } else if !entry.resource.is_valid().await {
            Some(DiscardReason::InvalidOnRelease)
        } else if let Err(error) = entry.resource.reset().await {
            tracing::warn!(
                pool = %self.name,
                resource_id = %resource_id,
                %error,
                "reset failed, discarding resource"
            );
            Some(DiscardReason::ResetFailed)
        } else {
            None
        };

        let retired = {
            let mut state = self.state.lock();
            returning.disarm();
            if !state.leased.remove(&entry.key) {
                drop(state);
                tracing::warn!(
                    pool = %self.name,
                    resource_id = %resource_id,
                    "released resource is not checked out from this pool, ignoring"
                );
                return ReleaseOutcome::Foreign;
            }
            state.releases += 1;
            match failure {
                None if state.phase == PoolState::Open => {
                    entry.idle_since = Instant::now();
                    state.idle.push_back(entry);
                    None
                }
                None => Some((entry, DiscardReason::Shutdown)),
                Some(reason) => Some((entry, reason)),
            }
        };
        // The resource is already back in idle (or gone), so the waiter this
        // wakes sees a consistent state.
        drop(permit);

        match retired {
            None => {
                tracing::debug!(
                    pool = %self.name,
                    resource_id = %resource_id,
                    held_ms = held_for.as_millis() as u64,
                    "released resource"
                );
                self.emit(PoolEvent::Released {
                    pool: self.name.clone(),
                    resource_id,
                    held_for,
                });
                ReleaseOutcome::Returned
            }
            Some((entry, reason)) => {
                let _ = self.retire(entry, reason).await;
                self.after_removal();
                if reason != DiscardReason::Shutdown && self.config.replenish_on_discard {
                    self.spawn_replenish();
                }
                ReleaseOutcome::Discarded(reason)
            }
        }
    }

    /// Remove a checked-out resource without closing it.
    pub(crate) fn detach(&self, entry: &Entry<F::Resource>, permit: OwnedSemaphorePermit) {
        let closed = {
            let mut state = self.state.lock();
            state.leased.remove(&entry.key);
            state.destroyed += 1;
            state.settle_closing()
        };
        drop(permit);
        tracing::debug!(pool = %self.name, resource_id = entry.resource.id(), "detached resource");
        self.emit(PoolEvent::Discarded {
            pool: self.name.clone(),
            resource_id: entry.resource.id().to_string(),
            reason: DiscardReason::Detached,
        });
        if closed {
            self.emit_closed();
        }
    }
}

// ---------------------------------------------------------------------------
// Pool<F>
// ---------------------------------------------------------------------------

/// Bounded pool of reusable resources.
///
/// Cheap to clone; clones share the same resources.
pub struct Pool<F: ResourceFactory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: ResourceFactory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: ResourceFactory> std::fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.inner.name)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<F: ResourceFactory> Pool<F> {
    /// Create a pool and eagerly fill it to `min_size`.
    ///
    /// # Errors
    /// `Configuration` if `config` is invalid, `CreationFailed` if any of the
    /// initial resources cannot be created (those already created are closed).
    pub async fn new(factory: F, config: PoolConfig) -> Result<Self> {
        Self::build(factory, config, None).await
    }

    /// Like [`Pool::new`], emitting lifecycle events on `events`.
    pub async fn with_events(
        factory: F,
        config: PoolConfig,
        events: Arc<EventBus>,
    ) -> Result<Self> {
        Self::build(factory, config, Some(events)).await
    }

    async fn build(factory: F, config: PoolConfig, events: Option<Arc<EventBus>>) -> Result<Self> {
        config.validate()?;
        let inner = Arc::new(PoolInner {
            name: factory.name().to_string(),
            slots: Arc::new(Semaphore::new(config.max_size)),
            state: Mutex::new(State {
                phase: PoolState::Open,
                idle: VecDeque::with_capacity(config.max_size),
                leased: HashSet::with_capacity(config.max_size),
                creating: 0,
                next_key: 0,
                created: 0,
                destroyed: 0,
                acquisitions: 0,
                releases: 0,
                exhausted: 0,
            }),
            factory,
            config,
            events,
        });

        let mut initial = Vec::with_capacity(inner.config.min_size);
        for key in 1..=inner.config.min_size as u64 {
            match inner.create(key).await {
                Ok(entry) => initial.push(entry),
                Err(error) => {
                    for entry in initial {
                        let _ = inner.retire(entry, DiscardReason::Shutdown).await;
                    }
                    return Err(error);
                }
            }
        }

        {
            let mut state = inner.state.lock();
            state.next_key = inner.config.min_size as u64;
            state.idle.extend(initial);
        }
        tracing::info!(
            pool = %inner.name,
            min_size = inner.config.min_size,
            max_size = inner.config.max_size,
            "pool initialized"
        );
        Ok(Self { inner })
    }

    /// The pool name (taken from the factory).
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The configuration the pool was built with.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Acquire a resource, waiting up to the configured `wait_timeout`.
    pub async fn acquire(&self) -> Result<Lease<F>> {
        self.acquire_inner(self.inner.config.wait_timeout, None).await
    }

    /// Acquire a resource, waiting up to `timeout`. Zero fails fast.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<Lease<F>> {
        self.acquire_inner(timeout, None).await
    }

    /// Acquire a resource, giving up after `timeout` or when `cancel` fires.
    pub async fn acquire_with_cancel(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Lease<F>> {
        self.acquire_inner(timeout, Some(cancel)).await
    }

    async fn acquire_inner(
        &self,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<Lease<F>> {
        let inner = &self.inner;
        let started = Instant::now();
        let permit = self.wait_for_slot(timeout, cancel, started).await?;

        loop {
            let reused = {
                let mut state = inner.state.lock();
                if state.phase != PoolState::Open {
                    return Err(Error::closed(&inner.name));
                }
                state.idle.pop_front()
            };

            if let Some(entry) = reused {
                let borrowed = Borrowed {
                    inner: Arc::clone(inner),
                    entry: Some(entry),
                };
                let reason = match inner.expiry(borrowed.entry()) {
                    Some(reason) => Some(reason),
                    None => {
                        if borrowed.entry().resource.is_valid().await {
                            None
                        } else {
                            Some(DiscardReason::InvalidOnAcquire)
                        }
                    }
                };
                let entry = borrowed.claim();
                match reason {
                    None => return self.check_out(entry, None, permit, started).await,
                    Some(reason) => {
                        let _ = inner.retire_detached(entry, reason).await;
                        inner.after_removal();
                    }
                }
            }

            // Nothing reusable: the slot we hold covers a new resource.
            let Some(reservation) = inner.reserve(inner.config.max_size)? else {
                // A release refilled idle in the meantime.
                if !inner.state.lock().idle.is_empty() {
                    continue;
                }
                // A held slot always leaves room for one more resource.
                tracing::error!(
                    pool = %inner.name,
                    stats = ?self.stats(),
                    "no capacity left for a held checkout slot"
                );
                return Err(inner.exhausted(started.elapsed()));
            };
            let entry = inner.create(reservation.key).await?;
            return self.check_out(entry, Some(reservation), permit, started).await;
        }
    }

    async fn wait_for_slot(
        &self,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
        started: Instant,
    ) -> Result<OwnedSemaphorePermit> {
        let inner = &self.inner;
        match Arc::clone(&inner.slots).try_acquire_owned() {
            Ok(permit) => return Ok(permit),
            Err(TryAcquireError::Closed) => return Err(Error::closed(&inner.name)),
            Err(TryAcquireError::NoPermits) if timeout.is_zero() => {
                return Err(inner.exhausted(started.elapsed()));
            }
            Err(TryAcquireError::NoPermits) => {}
        }

        let wait = tokio::time::timeout(timeout, Arc::clone(&inner.slots).acquire_owned());
        let waited = match cancel {
            Some(token) => tokio::select! {
                waited = wait => waited,
                () = token.cancelled() => {
                    return Err(Error::Cancelled { pool: inner.name.clone() });
                }
            },
            None => wait.await,
        };
        match waited {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(Error::closed(&inner.name)),
            Err(_) => Err(inner.exhausted(started.elapsed())),
        }
    }

    async fn check_out(
        &self,
        entry: Entry<F::Resource>,
        reservation: Option<Reservation<'_, F>>,
        permit: OwnedSemaphorePermit,
        started: Instant,
    ) -> Result<Lease<F>> {
        let inner = &self.inner;
        let open = {
            let mut state = inner.state.lock();
            if let Some(reservation) = reservation {
                reservation.settle(&mut state);
            }
            let open = state.phase == PoolState::Open;
            if open {
                state.leased.insert(entry.key);
                state.acquisitions += 1;
            }
            open
        };

        if !open {
            // Shutdown won the race while we validated or created.
            drop(permit);
            let _ = inner.retire_detached(entry, DiscardReason::Shutdown).await;
            inner.after_removal();
            return Err(Error::closed(&inner.name));
        }

        let waited = started.elapsed();
        tracing::debug!(
            pool = %inner.name,
            resource_id = entry.resource.id(),
            waited_ms = waited.as_millis() as u64,
            "acquired resource"
        );
        inner.emit(PoolEvent::Acquired {
            pool: inner.name.clone(),
            resource_id: entry.resource.id().to_string(),
            waited,
        });
        Ok(Lease::new(entry, permit, Arc::clone(inner)))
    }

    /// Hand a lease back to the pool and wait for validation and reset to
    /// finish. Dropping the lease does the same in a background task.
    ///
    /// A lease from another pool is left to return to its own pool; this
    /// pool is untouched.
    pub async fn release(&self, lease: Lease<F>) -> ReleaseOutcome {
        if !Arc::ptr_eq(&self.inner, lease.pool()) {
            tracing::warn!(
                pool = %self.inner.name,
                owner = %lease.pool().name(),
                "lease released to a pool that does not own it"
            );
            drop(lease);
            return ReleaseOutcome::Foreign;
        }
        lease.release().await
    }

    /// Lock-consistent snapshot of the pool counts.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        let idle = state.idle.len();
        let in_use = state.leased.len();
        PoolStats {
            state: state.phase,
            total: idle + in_use,
            idle,
            in_use,
            max_size: self.inner.config.max_size,
            created: state.created,
            destroyed: state.destroyed,
            acquisitions: state.acquisitions,
            releases: state.releases,
            exhausted: state.exhausted,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PoolState {
        self.inner.state.lock().phase
    }

    /// Evict expired idle resources, then top the pool up to `min_size`.
    pub async fn maintain(&self) -> Result<()> {
        let inner = &self.inner;
        let expired: Vec<_> = {
            let mut state = inner.state.lock();
            if state.phase != PoolState::Open {
                return Err(Error::closed(&inner.name));
            }
            let mut kept = VecDeque::with_capacity(state.idle.len());
            let mut expired = Vec::new();
            while let Some(entry) = state.idle.pop_front() {
                match inner.expiry(&entry) {
                    Some(reason) => expired.push((entry, reason)),
                    None => kept.push_back(entry),
                }
            }
            state.idle = kept;
            expired
        };

        for (entry, reason) in expired {
            let _ = inner.retire_detached(entry, reason).await;
        }

        let created = inner.fill_to_min().await?;
        if created > 0 {
            tracing::debug!(pool = %inner.name, created, "maintenance refilled pool");
        }
        Ok(())
    }

    /// Stop the pool.
    ///
    /// Idle resources are closed now; checked-out ones are closed when their
    /// leases come back. Blocked and future acquires fail with `PoolClosed`.
    /// Calling it again is a no-op.
    ///
    /// # Errors
    /// `Shutdown` listing every idle resource whose `close` failed. The pool
    /// is shut down either way.
    pub async fn shutdown(&self) -> Result<()> {
        let inner = &self.inner;
        let (drained, in_use, closed) = {
            let mut state = inner.state.lock();
            if state.phase != PoolState::Open {
                return Ok(());
            }
            state.phase = PoolState::Closing;
            let drained: Vec<_> = state.idle.drain(..).collect();
            let in_use = state.leased.len();
            (drained, in_use, state.settle_closing())
        };
        inner.slots.close();

        tracing::info!(pool = %inner.name, idle = drained.len(), in_use, "shutting down pool");
        inner.emit(PoolEvent::ShutdownStarted {
            pool: inner.name.clone(),
            in_use,
        });

        let mut failures = Vec::new();
        for entry in drained {
            if let Err(failure) = inner.retire_detached(entry, DiscardReason::Shutdown).await {
                failures.push(failure);
            }
        }
        if closed {
            inner.emit_closed();
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::Shutdown {
                pool: inner.name.clone(),
                failures,
            })
        }
    }
}
