//! Event broadcasting for pool lifecycle observability.
//!
//! Provides [`PoolEvent`] variants emitted during pool operations and an
//! [`EventBus`] backed by `tokio::sync::broadcast`.

use std::time::Duration;

use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// PoolEvent
// ---------------------------------------------------------------------------

/// Events emitted during pool operations.
///
/// All variants carry the `pool` name. Subscribers receive cloned copies via
/// [`EventBus::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// The factory produced a new resource.
    Created {
        /// The pool name.
        pool: String,
        /// The new resource's identity.
        resource_id: String,
    },
    /// The factory failed to produce a resource.
    CreationFailed {
        /// The pool name.
        pool: String,
        /// Human-readable error description.
        error: String,
    },
    /// A resource was handed to a caller.
    Acquired {
        /// The pool name.
        pool: String,
        /// The resource identity.
        resource_id: String,
        /// How long the caller waited for it.
        waited: Duration,
    },
    /// A valid resource was reset and returned to the idle set.
    Released {
        /// The pool name.
        pool: String,
        /// The resource identity.
        resource_id: String,
        /// How long the caller held it.
        held_for: Duration,
    },
    /// A resource was closed and permanently removed.
    Discarded {
        /// The pool name.
        pool: String,
        /// The resource identity.
        resource_id: String,
        /// Why it was removed.
        reason: DiscardReason,
    },
    /// An acquire gave up because nothing became available in time.
    Exhausted {
        /// The pool name.
        pool: String,
        /// How long the caller waited.
        waited: Duration,
    },
    /// `shutdown` was called; the pool stops accepting acquires.
    ShutdownStarted {
        /// The pool name.
        pool: String,
        /// Resources still checked out at that moment.
        in_use: usize,
    },
    /// The last resource has been closed.
    Closed {
        /// The pool name.
        pool: String,
    },
}

// ---------------------------------------------------------------------------
// DiscardReason
// ---------------------------------------------------------------------------

/// Reason a resource was permanently removed from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Found invalid when taken from the idle set.
    InvalidOnAcquire,
    /// Found invalid when its holder released it.
    InvalidOnRelease,
    /// `reset` failed, so its state cannot be trusted.
    ResetFailed,
    /// Exceeded the configured maximum lifetime.
    Expired,
    /// Sat idle longer than the configured idle timeout.
    IdleTimeout,
    /// The pool is shutting down.
    Shutdown,
    /// The holder detached it from the pool.
    Detached,
}

impl std::fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidOnAcquire => "invalid on acquire",
            Self::InvalidOnRelease => "invalid on release",
            Self::ResetFailed => "reset failed",
            Self::Expired => "max lifetime exceeded",
            Self::IdleTimeout => "idle timeout exceeded",
            Self::Shutdown => "pool shutdown",
            Self::Detached => "detached",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Broadcast-based event bus for pool lifecycle events.
///
/// Emission is fire-and-forget: if no subscribers are listening or the
/// channel is full, events are dropped (no backpressure on the pool).
pub struct EventBus {
    sender: broadcast::Sender<PoolEvent>,
}

impl EventBus {
    /// Create a new event bus with the given buffer size.
    ///
    /// The buffer size determines how many events can be queued before
    /// slow subscribers start lagging (and losing events).
    #[must_use]
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    pub fn emit(&self, event: PoolEvent) {
        // Err only means there are no active receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PoolEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.sender.receiver_count())
            .finish()
    }
}
