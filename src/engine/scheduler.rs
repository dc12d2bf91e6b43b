// src/engine/scheduler.rs

//! Worker-pool scheduler that drains a DAG in dependency order.
//!
//! The coordinator (the future returned by [`Scheduler::run_with`]) is the
//! only code that touches the DAG. Workers only see vertex ids arriving on
//! the work queue and send one [`Outcome`] back per id.
//!
//! Accounting: every vertex present when the run starts produces exactly one
//! outcome, either from a worker or synthesized as `Skipped` by the
//! coordinator when an ancestor fails. The coordinator therefore reads a
//! fixed number of outcomes and never waits on a result that cannot arrive.

use std::collections::{HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dag::{Dag, VertexId};
use crate::engine::{CancelFlag, Outcome, RunReport, Status};
use crate::errors::{Result, SqldagError};
use crate::exec::Executor;
use crate::types::TieBreak;

type JobQueue = Arc<Mutex<mpsc::Receiver<VertexId>>>;

/// Fixed-size worker pool configuration.
#[derive(Debug, Clone)]
pub struct Scheduler {
    worker_count: usize,
    tie_break: TieBreak,
    cancel: Option<CancelFlag>,
}

impl Scheduler {
    /// Scheduler with `worker_count` workers, unordered tie-break and no
    /// cancellation.
    pub fn new(worker_count: usize) -> Self {
        Self {
            worker_count,
            tie_break: TieBreak::default(),
            cancel: None,
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Drain `dag`, returning one outcome per vertex.
    pub async fn run<E: Executor>(&self, dag: Dag, executor: Arc<E>) -> Result<RunReport> {
        self.run_with(dag, executor, |_| {}).await
    }

    /// Drain `dag`, calling `on_outcome` for each outcome as it is consumed.
    ///
    /// `dag` is consumed by the run. A cyclic `dag` is rejected with
    /// [`SqldagError::DagCycle`] before any session is acquired.
    pub async fn run_with<E, F>(
        &self,
        mut dag: Dag,
        executor: Arc<E>,
        mut on_outcome: F,
    ) -> Result<RunReport>
    where
        E: Executor,
        F: FnMut(&Outcome),
    {
        if self.worker_count == 0 {
            return Err(SqldagError::ConfigError(
                "worker count must be >= 1 (got 0)".to_string(),
            ));
        }

        if let Some(cycle) = dag.find_cycle() {
            return Err(SqldagError::DagCycle(cycle.join(" -> ")));
        }

        let total = dag.len();
        if total == 0 {
            info!("nothing to run; DAG is empty");
            return Ok(RunReport::default());
        }

        // Acquire every session before dispatching anything, so a connection
        // failure aborts the run with no partial execution.
        let mut sessions = Vec::with_capacity(self.worker_count);
        for worker_id in 1..=self.worker_count {
            sessions.push(executor.acquire(worker_id).await?);
        }

        info!(
            vertices = total,
            workers = self.worker_count,
            "scheduler: starting run"
        );

        let (job_tx, job_rx) = mpsc::channel::<VertexId>(total);
        let job_rx: JobQueue = Arc::new(Mutex::new(job_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<Outcome>(total);

        let workers: Vec<JoinHandle<()>> = sessions
            .into_iter()
            .enumerate()
            .map(|(idx, session)| {
                tokio::spawn(worker_loop(
                    idx + 1,
                    session,
                    Arc::clone(&executor),
                    Arc::clone(&job_rx),
                    result_tx.clone(),
                    self.cancel.clone(),
                ))
            })
            .collect();
        // Only workers hold senders from here on; if they all exit the
        // result stream closes instead of hanging.
        drop(result_tx);

        let mut job_tx = Some(job_tx);
        let mut seen: HashSet<VertexId> = HashSet::with_capacity(total);
        if let Some(tx) = job_tx.as_ref() {
            enqueue_frontier(&dag, &mut seen, tx, self.tie_break)?;
        }

        let mut synthesized: VecDeque<Outcome> = VecDeque::new();
        let mut outcomes: Vec<Outcome> = Vec::with_capacity(total);

        while outcomes.len() < total {
            let outcome = match synthesized.pop_front() {
                Some(outcome) => outcome,
                None => match result_rx.recv().await {
                    Some(outcome) => outcome,
                    None => {
                        return Err(SqldagError::Execution(format!(
                            "result stream closed after {} of {} outcomes",
                            outcomes.len(),
                            total
                        )));
                    }
                },
            };

            debug!(vertex = %outcome.vertex, status = %outcome.status, "scheduler: received outcome");

            if outcome.status == Status::Error {
                // Closure first: removing the failed vertex drops its edges.
                let mut skipped: Vec<VertexId> =
                    dag.descendants_of(&outcome.vertex).into_iter().collect();
                skipped.sort();
                dag.remove_vertex(&outcome.vertex);

                if !skipped.is_empty() {
                    warn!(
                        vertex = %outcome.vertex,
                        skipped = skipped.len(),
                        "vertex failed; skipping descendants"
                    );
                }
                for vertex in skipped {
                    dag.remove_vertex(&vertex);
                    let description = format!("upstream '{}' failed", outcome.vertex);
                    synthesized.push_back(Outcome::skipped(vertex, description));
                }
            } else {
                dag.remove_vertex(&outcome.vertex);
            }

            if let Some(tx) = job_tx.as_ref() {
                enqueue_frontier(&dag, &mut seen, tx, self.tie_break)?;
            }

            if dag.is_empty() && job_tx.take().is_some() {
                debug!("scheduler: DAG drained; closing work queue");
            }

            on_outcome(&outcome);
            outcomes.push(outcome);
        }

        drop(job_tx);
        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "worker task failed to join");
            }
        }

        let report = RunReport { outcomes };
        info!(
            ok = report.count(Status::Ok),
            error = report.count(Status::Error),
            skipped = report.count(Status::Skipped),
            "scheduler: run finished"
        );
        Ok(report)
    }
}

/// Enqueue every frontier vertex that has not been enqueued before.
fn enqueue_frontier(
    dag: &Dag,
    seen: &mut HashSet<VertexId>,
    jobs: &mpsc::Sender<VertexId>,
    tie_break: TieBreak,
) -> Result<()> {
    let mut ready: Vec<VertexId> = dag
        .vertices_without_ancestors()
        .into_iter()
        .filter(|v| !seen.contains(v))
        .collect();

    if tie_break == TieBreak::Lexical {
        ready.sort();
    }

    for vertex in ready {
        debug!(vertex = %vertex, "scheduler: enqueueing ready vertex");
        seen.insert(vertex.clone());
        // Capacity equals the vertex count and each vertex is sent once, so
        // this only fails if every worker is gone.
        jobs.try_send(vertex).map_err(|e| {
            SqldagError::Execution(format!("work queue rejected vertex: {e}"))
        })?;
    }

    Ok(())
}

async fn worker_loop<E: Executor>(
    worker_id: usize,
    mut session: E::Session,
    executor: Arc<E>,
    jobs: JobQueue,
    results: mpsc::Sender<Outcome>,
    cancel: Option<CancelFlag>,
) {
    debug!(worker = worker_id, "worker started");

    loop {
        let next = {
            let mut rx = jobs.lock().await;
            rx.recv().await
        };
        let Some(vertex) = next else {
            break;
        };

        let outcome = if cancel.as_ref().is_some_and(CancelFlag::is_cancelled) {
            debug!(worker = worker_id, vertex = %vertex, "run cancelled; not executing");
            Outcome::skipped(vertex, "run cancelled")
        } else {
            debug!(worker = worker_id, vertex = %vertex, "worker executing vertex");
            execute_isolated(executor.as_ref(), &mut session, vertex).await
        };

        if results.send(outcome).await.is_err() {
            warn!(worker = worker_id, "result channel closed; worker exiting");
            break;
        }
    }

    drop(session);
    debug!(worker = worker_id, "worker finished; session released");
}

/// Run one vertex, turning a panic in the executor into an `Error` outcome.
///
/// The worker owns the vertex id: whatever id the executor puts in its
/// outcome is replaced by the one that was dispatched.
async fn execute_isolated<E: Executor>(
    executor: &E,
    session: &mut E::Session,
    vertex: VertexId,
) -> Outcome {
    let result = AssertUnwindSafe(executor.execute(session, &vertex))
        .catch_unwind()
        .await;

    match result {
        Ok(Outcome {
            status,
            description,
            ..
        }) => Outcome {
            vertex,
            status,
            description,
        },
        Err(payload) => {
            let message = if let Some(s) = payload.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = payload.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic payload".to_string()
            };
            error!(vertex = %vertex, panic = %message, "executor panicked");
            Outcome::error(vertex, format!("executor panicked: {message}"))
        }
    }
}
