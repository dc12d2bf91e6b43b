// src/exec/adapter.rs

//! Database adapters.
//!
//! An [`Adapter`] hands out one [`Connection`] per worker. Statements are
//! executed one at a time on a connection.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::OutputConfig;
use crate::errors::{Result, SqldagError};
use crate::exec::BoxFuture;
use crate::types::AdapterKind;

/// A single exclusive connection to the data store.
pub trait Connection: Send {
    fn execute<'a>(&'a mut self, statement: &'a str) -> BoxFuture<'a, Result<()>>;
}

/// Factory for connections.
pub trait Adapter: Send + Sync {
    fn name(&self) -> &'static str;

    fn connect(&self, worker_id: usize) -> BoxFuture<'_, Result<Box<dyn Connection>>>;
}

/// Build the adapter configured for an output.
pub fn adapter_for(output: &OutputConfig) -> Result<Arc<dyn Adapter>> {
    match output.adapter {
        AdapterKind::Shell => {
            let command = output.command.clone().ok_or_else(|| {
                SqldagError::ConfigError("shell adapter requires a 'command'".to_string())
            })?;
            Ok(Arc::new(ShellAdapter::new(command)))
        }
        AdapterKind::DryRun => Ok(Arc::new(DryRunAdapter)),
    }
}

/// Pipes every statement into the stdin of a fresh shell process.
///
/// `command` is run through `sh -c` (`cmd /C` on Windows), e.g.
/// `sqlite3 warehouse.db`. A non-zero exit status fails the statement with
/// the process' stderr as the message.
#[derive(Debug, Clone)]
pub struct ShellAdapter {
    command: String,
}

impl ShellAdapter {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Adapter for ShellAdapter {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn connect(&self, worker_id: usize) -> BoxFuture<'_, Result<Box<dyn Connection>>> {
        Box::pin(async move {
            debug!(worker = worker_id, cmd = %self.command, "opening shell connection");
            Ok(Box::new(ShellConnection {
                command: self.command.clone(),
                worker_id,
            }) as Box<dyn Connection>)
        })
    }
}

struct ShellConnection {
    command: String,
    worker_id: usize,
}

impl ShellConnection {
    fn build_command(&self) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.command);
            c
        };
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Connection for ShellConnection {
    fn execute<'a>(&'a mut self, statement: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let started = Instant::now();
            let mut child = self
                .build_command()
                .spawn()
                .with_context(|| format!("spawning '{}'", self.command))?;

            // stdin is fed while stdout/stderr are drained; a client that
            // echoes its input would otherwise fill the pipe and block.
            let stdin = child.stdin.take();
            let feed = async move {
                if let Some(mut stdin) = stdin {
                    stdin.write_all(statement.as_bytes()).await?;
                    stdin.write_all(b";\n").await?;
                }
                Ok::<(), std::io::Error>(())
            };
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            let output = output.with_context(|| format!("waiting for '{}'", self.command))?;

            debug!(
                worker = self.worker_id,
                status = ?output.status.code(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "shell statement finished"
            );

            if output.status.success() {
                match fed {
                    // The process exited cleanly without reading all input.
                    Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                    Err(e) => Err(anyhow::Error::new(e)
                        .context("writing statement to stdin")
                        .into()),
                    Ok(()) => Ok(()),
                }
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let message = match stderr.trim() {
                    "" => format!("'{}' exited with {}", self.command, output.status),
                    text => text.to_string(),
                };
                Err(SqldagError::Execution(message))
            }
        })
    }
}

/// Logs statements instead of executing them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunAdapter;

impl Adapter for DryRunAdapter {
    fn name(&self) -> &'static str {
        "dry_run"
    }

    fn connect(&self, worker_id: usize) -> BoxFuture<'_, Result<Box<dyn Connection>>> {
        Box::pin(async move { Ok(Box::new(DryRunConnection { worker_id }) as Box<dyn Connection>) })
    }
}

struct DryRunConnection {
    worker_id: usize,
}

impl Connection for DryRunConnection {
    fn execute<'a>(&'a mut self, statement: &'a str) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            info!(worker = self.worker_id, statement = %statement, "dry run: not executing");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(adapter: AdapterKind, command: Option<&str>) -> OutputConfig {
        OutputConfig {
            adapter,
            threads: 1,
            database: "db".to_string(),
            schema: "sch".to_string(),
            command: command.map(str::to_string),
        }
    }

    #[test]
    fn adapter_for_picks_configured_kind() {
        let a = adapter_for(&output(AdapterKind::DryRun, None)).unwrap();
        assert_eq!(a.name(), "dry_run");
        let a = adapter_for(&output(AdapterKind::Shell, Some("cat"))).unwrap();
        assert_eq!(a.name(), "shell");
        assert!(adapter_for(&output(AdapterKind::Shell, None)).is_err());
    }

    #[tokio::test]
    async fn dry_run_always_succeeds() {
        let mut conn = DryRunAdapter.connect(1).await.unwrap();
        conn.execute("create or replace view a.b.c as\nselect 1").await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shell_reports_exit_status_and_stderr() {
        let ok = ShellAdapter::new("cat > /dev/null");
        let mut conn = ok.connect(1).await.unwrap();
        conn.execute("select 1").await.unwrap();

        let failing = ShellAdapter::new("cat > /dev/null; echo boom >&2; exit 3");
        let mut conn = failing.connect(1).await.unwrap();
        let err = conn.execute("select 1").await.unwrap_err();
        match err {
            SqldagError::Execution(message) => assert_eq!(message, "boom"),
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shell_drains_output_while_feeding_large_statement() {
        let echo = ShellAdapter::new("cat");
        let mut conn = echo.connect(1).await.unwrap();
        let statement = format!("select '{}'", "x".repeat(1 << 20));

        tokio::time::timeout(std::time::Duration::from_secs(5), conn.execute(&statement))
            .await
            .expect("statement did not finish")
            .unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn shell_that_ignores_stdin_still_succeeds() {
        let ignoring = ShellAdapter::new("exit 0");
        let mut conn = ignoring.connect(1).await.unwrap();
        let statement = "x".repeat(1 << 20);
        conn.execute(&statement).await.unwrap();
    }
}
