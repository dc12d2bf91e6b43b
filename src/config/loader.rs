// src/config/loader.rs

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{
    PROFILES_FILE, PROJECT_FILE, ProjectConfig, ProjectFile, RawProfilesFile, RawProjectFile,
    SourcesFile,
};
use crate::config::validate::resolve_output;
use crate::errors::Result;
use crate::fs::FileSystem;

/// Load `sqldag_project.toml` from `project_dir` without resolving profiles.
///
/// This only performs TOML deserialization plus the checks on the
/// `[project]` section itself.
pub fn load_project_file(fs: &dyn FileSystem, project_dir: &Path) -> Result<ProjectFile> {
    let path = project_dir.join(PROJECT_FILE);
    let contents = fs.read_to_string(&path)?;
    let raw: RawProjectFile = toml::from_str(&contents)?;
    debug!(path = ?path, "loaded project file");
    ProjectFile::try_from(raw)
}

/// Load `profiles.toml` from `profiles_dir`.
pub fn load_profiles_file(fs: &dyn FileSystem, profiles_dir: &Path) -> Result<RawProfilesFile> {
    let path = profiles_dir.join(PROFILES_FILE);
    let contents = fs.read_to_string(&path)?;
    let raw: RawProfilesFile = toml::from_str(&contents)?;
    debug!(path = ?path, profiles = raw.len(), "loaded profiles file");
    Ok(raw)
}

/// Load the project and profiles files and pick the active output.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads both TOML files.
/// - Applies defaults (handled by `serde`).
/// - Checks that the referenced profile and target exist and that the
///   output is usable (threads >= 1, shell adapters have a command).
pub fn load_and_validate(
    fs: &dyn FileSystem,
    project_dir: &Path,
    profiles_dir: &Path,
    target_override: Option<&str>,
) -> Result<ProjectConfig> {
    let project = load_project_file(fs, project_dir)?;
    let profiles = load_profiles_file(fs, profiles_dir)?;
    resolve_output(project, profiles, target_override)
}

/// Parse one sources declaration file.
pub fn load_sources_file(fs: &dyn FileSystem, path: &Path) -> Result<SourcesFile> {
    let contents = fs.read_to_string(path)?;
    let sources: SourcesFile = toml::from_str(&contents)?;
    debug!(path = ?path, namespaces = sources.sources.len(), "loaded sources file");
    Ok(sources)
}

/// Default directory holding `profiles.toml`.
///
/// `SQLDAG_PROFILES_DIR` wins; otherwise the project directory itself.
pub fn default_profiles_dir(project_dir: &Path) -> PathBuf {
    std::env::var_os("SQLDAG_PROFILES_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|| project_dir.to_path_buf())
}
