// src/exec/backend.rs

//! Pluggable executor abstraction used by the scheduler.
//!
//! The scheduler talks to an [`Executor`] instead of a concrete database
//! client. Each worker acquires one `Session` when the pool starts, keeps it
//! exclusively for its lifetime, and drops it when the work queue closes.
//!
//! - [`crate::exec::runner::ModelRunner`] is the production implementation:
//!   it compiles a model and executes it on an adapter connection.
//! - Tests provide their own `Executor` that records dispatch order and
//!   returns scripted outcomes.

use std::future::Future;
use std::pin::Pin;

use crate::engine::Outcome;
use crate::errors::Result;

/// Boxed future returned by executor methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait abstracting how a single vertex is executed.
///
/// `execute` is called concurrently from different workers, each with its
/// own session and a different vertex id. It may block for as long as the
/// work takes; failures must be reported as an `Error` outcome rather than
/// a panic.
pub trait Executor: Send + Sync + 'static {
    /// Exclusive per-worker resource (e.g. one database connection).
    type Session: Send + 'static;

    /// Obtain the session for worker `worker_id` (1-based).
    ///
    /// A failure here aborts the run before any vertex is dispatched.
    fn acquire(&self, worker_id: usize) -> BoxFuture<'_, Result<Self::Session>>;

    /// Execute `vertex` using the worker's session.
    fn execute<'a>(&'a self, session: &'a mut Self::Session, vertex: &'a str)
    -> BoxFuture<'a, Outcome>;
}
