// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::AdapterKind;

/// Project file name looked up in the project directory.
pub const PROJECT_FILE: &str = "sqldag_project.toml";

/// Profiles file name looked up in the profiles directory.
pub const PROFILES_FILE: &str = "profiles.toml";

/// `sqldag_project.toml` as read from disk.
///
/// ```toml
/// [project]
/// name = "jaffle_shop"
/// profile = "jaffle"
/// model_paths = ["models"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawProjectFile {
    pub project: ProjectSection,
}

/// `[project]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    /// Project name, used in model unique ids (`model.<project>.<name>`).
    pub name: String,

    /// Which entry of `profiles.toml` to connect with.
    pub profile: String,

    /// Directories (relative to the project dir) searched for models and
    /// source declarations.
    #[serde(default = "default_model_paths")]
    pub model_paths: Vec<String>,
}

fn default_model_paths() -> Vec<String> {
    vec!["models".to_string()]
}

/// Validated project file. Construct via `TryFrom<RawProjectFile>`.
#[derive(Debug, Clone)]
pub struct ProjectFile {
    pub project: ProjectSection,
}

impl ProjectFile {
    pub(crate) fn new_unchecked(project: ProjectSection) -> Self {
        Self { project }
    }
}

/// `profiles.toml`: profile name -> profile.
///
/// ```toml
/// [jaffle]
/// target = "dev"
///
/// [jaffle.outputs.dev]
/// type = "shell"
/// command = "sqlite3 warehouse.db"
/// threads = 4
/// database = "main"
/// schema = "analytics"
/// ```
pub type RawProfilesFile = BTreeMap<String, ProfileSection>;

/// One profile: a default target plus named outputs.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileSection {
    pub target: String,

    #[serde(default)]
    pub outputs: BTreeMap<String, OutputConfig>,
}

/// Connection settings of one output.
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Adapter used to execute statements.
    #[serde(rename = "type")]
    pub adapter: AdapterKind,

    /// Number of concurrent workers (each holds its own connection).
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Database models are materialized into.
    pub database: String,

    /// Schema models are materialized into.
    pub schema: String,

    /// Shell command statements are piped into (`type = "shell"` only).
    #[serde(default)]
    pub command: Option<String>,
}

fn default_threads() -> usize {
    1
}

/// Fully resolved configuration for one invocation: the project plus the
/// output selected from its profile.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub project: ProjectSection,
    pub profile: String,
    pub target: String,
    pub output: OutputConfig,
}

/// A sources declaration file (`*.toml` under a model path).
///
/// ```toml
/// [[sources]]
/// name = "raw"
/// database = "raw_db"
/// schema = "public"
/// tables = ["orders", "customers"]
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SourcesFile {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Namespace used in `source('<name>', '<table>')`.
    pub name: String,
    pub database: String,
    pub schema: String,
    #[serde(default)]
    pub tables: Vec<String>,
}
