// src/engine/mod.rs

//! Execution engine for sqldag.
//!
//! This module defines the per-vertex [`Outcome`] type and the
//! [`scheduler::Scheduler`] that drains a DAG with a fixed worker pool.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::dag::VertexId;

pub mod scheduler;

pub use scheduler::Scheduler;

/// Terminal status of a vertex in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Executed successfully.
    Ok,
    /// Executed and failed.
    Error,
    /// Not executed, because an ancestor failed or the run was cancelled.
    Skipped,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Ok => "OK",
            Status::Error => "ERROR",
            Status::Skipped => "SKIP",
        };
        f.pad(s)
    }
}

/// The single terminal result produced for one vertex.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub vertex: VertexId,
    pub status: Status,
    pub description: String,
}

impl Outcome {
    pub fn ok(vertex: impl Into<VertexId>, description: impl Into<String>) -> Self {
        Self::new(vertex, Status::Ok, description)
    }

    pub fn error(vertex: impl Into<VertexId>, description: impl Into<String>) -> Self {
        Self::new(vertex, Status::Error, description)
    }

    pub fn skipped(vertex: impl Into<VertexId>, description: impl Into<String>) -> Self {
        Self::new(vertex, Status::Skipped, description)
    }

    fn new(vertex: impl Into<VertexId>, status: Status, description: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            status,
            description: description.into(),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<5} {} ({})", self.status, self.vertex, self.description)
    }
}

/// All outcomes of a run, in the order the scheduler consumed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub outcomes: Vec<Outcome>,
}

impl RunReport {
    /// A run succeeds only if every vertex reached `Ok`.
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.status == Status::Ok)
    }

    pub fn count(&self, status: Status) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn outcome_of(&self, vertex: &str) -> Option<&Outcome> {
        self.outcomes.iter().find(|o| o.vertex == vertex)
    }
}

/// Shared flag that asks a running scheduler to stop dispatching work.
///
/// Once raised, every vertex a worker dequeues is reported as `Skipped`
/// instead of being executed. Vertices already executing finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_fails_when_anything_is_not_ok() {
        let mut report = RunReport {
            outcomes: vec![Outcome::ok("a", "done"), Outcome::ok("b", "done")],
        };
        assert!(report.succeeded());

        report.outcomes.push(Outcome::skipped("c", "upstream failed"));
        assert!(!report.succeeded());
        assert_eq!(report.count(Status::Skipped), 1);
        assert_eq!(report.outcome_of("c").map(|o| o.status), Some(Status::Skipped));
    }

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
