// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `sqldag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sqldag",
    version,
    about = "Compile SQL models and materialize them in dependency order.",
    long_about = None
)]
pub struct CliArgs {
    /// Directory containing `sqldag_project.toml`.
    #[arg(long, value_name = "DIR", default_value = ".", global = true)]
    pub project_dir: PathBuf,

    /// Directory containing `profiles.toml`.
    ///
    /// Default: `SQLDAG_PROFILES_DIR`, else the project directory.
    #[arg(long, value_name = "DIR", global = true)]
    pub profiles_dir: Option<PathBuf>,

    /// Profile output to use instead of the profile's default target.
    #[arg(long, value_name = "NAME", global = true)]
    pub target: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SQLDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Materialize the selected models.
    Run(RunArgs),

    /// Print the compiled SQL of the selected models.
    Compile(SelectArgs),

    /// List the selected models in dependency order.
    Ls(SelectArgs),

    /// Recompile models whenever their files change.
    Watch,
}

#[derive(Debug, Clone, Default, Args)]
pub struct SelectArgs {
    /// Selector, e.g. `+orders customers+`. Empty selects everything.
    #[arg(short = 'm', long = "select", visible_alias = "model", value_name = "SELECTOR")]
    pub select: Option<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub selection: SelectArgs,

    /// Number of workers; overrides the output's `threads`.
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,

    /// Hand newly ready models to workers in name order.
    #[arg(long)]
    pub lexical: bool,

    /// Print the execution plan without executing anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
