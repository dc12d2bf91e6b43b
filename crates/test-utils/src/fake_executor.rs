use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sqldag::dag::Dag;
use sqldag::engine::Outcome;
use sqldag::errors::{Result, SqldagError};
use sqldag::exec::{BoxFuture, Executor};

/// What the fake does when asked to execute a vertex.
#[derive(Debug, Clone)]
pub enum Behaviour {
    Succeed,
    Fail(String),
    Panic(String),
}

/// One entry of the execution log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started { vertex: String, worker: usize },
    Finished { vertex: String, worker: usize },
}

/// Session handed to each worker.
#[derive(Debug)]
pub struct FakeSession {
    pub worker_id: usize,
}

/// A fake executor that:
/// - records when each vertex starts and finishes, and on which worker
/// - returns scripted outcomes (success by default)
/// - can delay vertices, panic, or refuse to hand out a session
#[derive(Debug, Default)]
pub struct FakeExecutor {
    behaviours: HashMap<String, Behaviour>,
    delays: HashMap<String, Duration>,
    default_delay: Option<Duration>,
    fail_acquire: Option<usize>,
    log: Arc<Mutex<Vec<Event>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    acquired: AtomicUsize,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, vertex: &str) -> Self {
        self.behaviours.insert(
            vertex.to_string(),
            Behaviour::Fail(format!("{vertex} failed on purpose")),
        );
        self
    }

    pub fn panicking(mut self, vertex: &str) -> Self {
        self.behaviours
            .insert(vertex.to_string(), Behaviour::Panic(format!("{vertex} exploded")));
        self
    }

    pub fn delay(mut self, vertex: &str, delay: Duration) -> Self {
        self.delays.insert(vertex.to_string(), delay);
        self
    }

    /// Delay for every vertex without its own delay.
    pub fn default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    /// Make `acquire` fail for this worker id.
    pub fn fail_acquire_for(mut self, worker_id: usize) -> Self {
        self.fail_acquire = Some(worker_id);
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.lock().unwrap().clone()
    }

    /// Vertices in the order they were started.
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Started { vertex, .. } => Some(vertex),
                Event::Finished { .. } => None,
            })
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn sessions_acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Vertices that started before every one of their ancestors (in `dag`)
    /// had finished. Empty when dispatch respected dependencies.
    pub fn premature_starts(&self, dag: &Dag) -> Vec<String> {
        let mut finished: HashSet<String> = HashSet::new();
        let mut violations = Vec::new();

        for event in self.events() {
            match event {
                Event::Started { vertex, .. } => {
                    if dag.contains(&vertex)
                        && !dag.ancestors_of(&vertex).iter().all(|a| finished.contains(a))
                    {
                        violations.push(vertex);
                    }
                }
                Event::Finished { vertex, .. } => {
                    finished.insert(vertex);
                }
            }
        }

        violations
    }

    fn record(&self, event: Event) {
        self.log.lock().unwrap().push(event);
    }
}

impl Executor for FakeExecutor {
    type Session = FakeSession;

    fn acquire(&self, worker_id: usize) -> BoxFuture<'_, Result<Self::Session>> {
        Box::pin(async move {
            if self.fail_acquire == Some(worker_id) {
                return Err(SqldagError::Execution(format!(
                    "worker {worker_id} could not connect"
                )));
            }
            self.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(FakeSession { worker_id })
        })
    }

    fn execute<'a>(
        &'a self,
        session: &'a mut Self::Session,
        vertex: &'a str,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let worker = session.worker_id;
            self.record(Event::Started {
                vertex: vertex.to_string(),
                worker,
            });
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(delay) = self.delays.get(vertex).copied().or(self.default_delay) {
                tokio::time::sleep(delay).await;
            }

            let behaviour = self
                .behaviours
                .get(vertex)
                .cloned()
                .unwrap_or(Behaviour::Succeed);

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.record(Event::Finished {
                vertex: vertex.to_string(),
                worker,
            });

            match behaviour {
                Behaviour::Succeed => Outcome::ok(vertex, format!("ran on worker {worker}")),
                Behaviour::Fail(message) => Outcome::error(vertex, message),
                Behaviour::Panic(message) => panic!("{message}"),
            }
        })
    }
}
