// src/exec/runner.rs

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::engine::Outcome;
use crate::errors::Result;
use crate::exec::adapter::{Adapter, Connection};
use crate::exec::{BoxFuture, Executor};
use crate::project::Project;

/// Production executor: compiles a model and materializes it on the
/// worker's connection.
pub struct ModelRunner {
    project: Arc<Project>,
    adapter: Arc<dyn Adapter>,
}

impl ModelRunner {
    pub fn new(project: Arc<Project>, adapter: Arc<dyn Adapter>) -> Self {
        Self { project, adapter }
    }
}

impl Executor for ModelRunner {
    type Session = Box<dyn Connection>;

    fn acquire(&self, worker_id: usize) -> BoxFuture<'_, Result<Self::Session>> {
        Box::pin(async move {
            let conn = self.adapter.connect(worker_id).await?;
            debug!(worker = worker_id, adapter = self.adapter.name(), "worker connected");
            Ok(conn)
        })
    }

    fn execute<'a>(
        &'a self,
        session: &'a mut Self::Session,
        vertex: &'a str,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let compiled = match self.project.compile_model(vertex) {
                Ok(compiled) => compiled,
                Err(err) => {
                    warn!(vertex = %vertex, error = %err, "model failed to compile");
                    return Outcome::error(vertex, err.to_string());
                }
            };

            let started = Instant::now();
            info!(vertex = %vertex, relation = %compiled.relation, "running model");

            match session.execute(&compiled.statement()).await {
                Ok(()) => Outcome::ok(
                    vertex,
                    format!(
                        "created {} {} in {:.2}s",
                        compiled.materialization,
                        compiled.relation,
                        started.elapsed().as_secs_f64()
                    ),
                ),
                Err(err) => {
                    warn!(vertex = %vertex, error = %err, "model failed");
                    Outcome::error(vertex, err.to_string())
                }
            }
        })
    }
}
