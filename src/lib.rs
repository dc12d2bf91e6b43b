// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod project;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command, RunArgs, SelectArgs};
use crate::config::{ProjectConfig, default_profiles_dir, load_and_validate};
use crate::dag::{Dag, execution_plan};
use crate::engine::{CancelFlag, Scheduler, Status};
use crate::errors::Result;
use crate::exec::{ModelRunner, adapter_for};
use crate::fs::{FileSystem, RealFileSystem};
use crate::project::Project;
use crate::types::TieBreak;

/// High-level entry point used by `main.rs`.
///
/// Returns `Ok(false)` when the command ran but some model did not succeed
/// (the process should exit non-zero).
pub async fn run(args: CliArgs) -> Result<bool> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let profiles_dir = args
        .profiles_dir
        .clone()
        .unwrap_or_else(|| default_profiles_dir(&args.project_dir));
    let config = load_and_validate(
        fs.as_ref(),
        &args.project_dir,
        &profiles_dir,
        args.target.as_deref(),
    )?;
    info!(
        project = %config.project.name,
        profile = %config.profile,
        target = %config.target,
        "configuration loaded"
    );

    match args.command {
        Command::Run(run_args) => run_models(fs.as_ref(), &args.project_dir, &config, run_args).await,
        Command::Compile(select) => {
            compile_models(fs.as_ref(), &args.project_dir, &config, &select)?;
            Ok(true)
        }
        Command::Ls(select) => {
            list_models(fs.as_ref(), &args.project_dir, &config, &select)?;
            Ok(true)
        }
        Command::Watch => watch_models(fs, &args.project_dir, &config).await,
    }
}

/// Load the project and return it with the selected sub-graph.
pub fn load_selection(
    fs: &dyn FileSystem,
    project_dir: &Path,
    config: &ProjectConfig,
    select: Option<&str>,
) -> Result<(Project, Dag)> {
    let project = Project::load(fs, project_dir, config)?;
    let dag = project.build_dag()?;
    let dag = match select {
        Some(expr) => dag.select(expr)?,
        None => dag,
    };
    debug!(selected = dag.len(), "selection applied");
    Ok((project, dag))
}

async fn run_models(
    fs: &dyn FileSystem,
    project_dir: &Path,
    config: &ProjectConfig,
    args: RunArgs,
) -> Result<bool> {
    let (project, dag) = load_selection(fs, project_dir, config, args.selection.select.as_deref())?;

    if args.dry_run {
        println!("sqldag dry-run ({} models)", dag.len());
        for (idx, name) in execution_plan(&dag)?.iter().enumerate() {
            match project.relation_of(name) {
                Some(relation) => println!("  {:>3}. {name} -> {relation}", idx + 1),
                None => println!("  {:>3}. {name}", idx + 1),
            }
        }
        return Ok(true);
    }

    let threads = args.threads.unwrap_or(config.output.threads);
    let tie_break = if args.lexical {
        TieBreak::Lexical
    } else {
        TieBreak::Unordered
    };

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            warn!("interrupt received; finishing running models and skipping the rest");
            cancel.cancel();
        });
    }

    let adapter = adapter_for(&config.output)?;
    let runner = Arc::new(ModelRunner::new(Arc::new(project), adapter));
    let scheduler = Scheduler::new(threads)
        .with_tie_break(tie_break)
        .with_cancel_flag(cancel);

    let total = dag.len();
    let mut done = 0usize;
    let report = scheduler
        .run_with(dag, runner, |outcome| {
            done += 1;
            println!("{done:>3} of {total} {outcome}");
        })
        .await?;

    println!();
    println!(
        "Finished running {} models: {} ok, {} error, {} skipped.",
        report.outcomes.len(),
        report.count(Status::Ok),
        report.count(Status::Error),
        report.count(Status::Skipped),
    );
    Ok(report.succeeded())
}

fn compile_models(
    fs: &dyn FileSystem,
    project_dir: &Path,
    config: &ProjectConfig,
    select: &SelectArgs,
) -> Result<()> {
    let (project, dag) = load_selection(fs, project_dir, config, select.select.as_deref())?;

    for name in execution_plan(&dag)? {
        let compiled = project.compile_model(&name)?;
        if let Some(model) = project.model(&name) {
            println!("-- {} ({})", model.unique_id, compiled.relation);
        }
        println!("{}", compiled.sql);
        println!();
    }
    Ok(())
}

fn list_models(
    fs: &dyn FileSystem,
    project_dir: &Path,
    config: &ProjectConfig,
    select: &SelectArgs,
) -> Result<()> {
    let (project, dag) = load_selection(fs, project_dir, config, select.select.as_deref())?;
    for name in execution_plan(&dag)? {
        match project.model(&name) {
            Some(model) => println!("{}", model.unique_id),
            None => println!("{name}"),
        }
    }
    Ok(())
}

/// Compile every model once, then again whenever a model or source file
/// changes. Compile failures are reported and watching continues.
async fn watch_models(
    fs: Arc<dyn FileSystem>,
    project_dir: &Path,
    config: &ProjectConfig,
) -> Result<bool> {
    let dirs: Vec<PathBuf> = config
        .project
        .model_paths
        .iter()
        .map(|p| project_dir.join(p))
        .collect();

    report_compile(fs.as_ref(), project_dir, config);

    let (changes_tx, mut changes_rx) = mpsc::channel::<Vec<PathBuf>>(16);
    let _watcher = watch::spawn_watcher(fs.clone(), dirs, changes_tx)?;

    loop {
        tokio::select! {
            changed = changes_rx.recv() => {
                let Some(changed) = changed else {
                    break;
                };
                info!(files = ?changed, "model files changed; recompiling");
                report_compile(fs.as_ref(), project_dir, config);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received; stopping watch");
                break;
            }
        }
    }

    Ok(true)
}

fn report_compile(fs: &dyn FileSystem, project_dir: &Path, config: &ProjectConfig) {
    match compile_all(fs, project_dir, config) {
        Ok((ok, failed)) => {
            println!("compiled {ok} models, {} failed", failed.len());
            for (name, err) in failed {
                println!("  ERROR {name}: {err}");
            }
        }
        Err(err) => println!("project failed to load: {err}"),
    }
}

fn compile_all(
    fs: &dyn FileSystem,
    project_dir: &Path,
    config: &ProjectConfig,
) -> Result<(usize, Vec<(String, String)>)> {
    let (project, dag) = load_selection(fs, project_dir, config, None)?;
    let mut ok = 0;
    let mut failed = Vec::new();
    for name in execution_plan(&dag)? {
        match project.compile_model(&name) {
            Ok(_) => ok += 1,
            Err(err) => failed.push((name, err.to_string())),
        }
    }
    Ok((ok, failed))
}
