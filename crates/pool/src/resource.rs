//! Core resource traits
//!
//! A [`ResourceFactory`] produces [`Resource`] values; the pool validates,
//! resets and closes them through the [`Resource`] methods. Both traits are
//! supplied by the caller; the pool never assumes anything about timing or
//! transport.

use std::future::Future;

use crate::error::BoxError;

/// A pooled, reusable, potentially stateful capability (e.g. a connection).
///
/// The pool only calls these methods while it exclusively owns the value:
/// before handing it out and after it comes back. Never while a client
/// holds it.
pub trait Resource: Send + Sync + Sized + 'static {
    /// Identity assigned at creation. Must not change for the lifetime of
    /// the value.
    fn id(&self) -> &str;

    /// Whether the resource can still be used.
    fn is_valid(&self) -> impl Future<Output = bool> + Send;

    /// Clear any state left behind by the previous holder (open transactions,
    /// session variables, warnings).
    ///
    /// Called on every release of a valid resource. An error means the
    /// resource cannot be trusted and it is discarded instead of reused.
    fn reset(&mut self) -> impl Future<Output = Result<(), BoxError>> + Send {
        async { Ok(()) }
    }

    /// Release the underlying system resources. Called exactly once when the
    /// resource leaves the pool for good.
    fn close(self) -> impl Future<Output = Result<(), BoxError>> + Send {
        async move {
            drop(self);
            Ok(())
        }
    }
}

/// Creates new resources on demand.
pub trait ResourceFactory: Send + Sync + 'static {
    /// The resource type produced by this factory.
    type Resource: Resource;

    /// Name used in logs, events and errors (e.g. "postgres", "mysql-main").
    fn name(&self) -> &str;

    /// Create a new resource. A failure leaves the pool counts untouched.
    fn create(&self) -> impl Future<Output = Result<Self::Resource, BoxError>> + Send;
}
