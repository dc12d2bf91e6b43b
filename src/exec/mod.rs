// src/exec/mod.rs

//! Execution layer.
//!
//! - [`backend`] defines the [`Executor`] trait the scheduler drives.
//! - [`adapter`] holds the database adapters (`shell`, `dry_run`).
//! - [`runner`] provides [`ModelRunner`], which compiles models and runs
//!   them through an adapter.

pub mod adapter;
pub mod backend;
pub mod runner;

pub use adapter::{Adapter, Connection, DryRunAdapter, ShellAdapter, adapter_for};
pub use backend::{BoxFuture, Executor};
pub use runner::ModelRunner;
