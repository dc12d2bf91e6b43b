// src/config/validate.rs

use crate::config::model::{
    OutputConfig, ProjectConfig, ProjectFile, RawProfilesFile, RawProjectFile,
};
use crate::errors::{Result, SqldagError};
use crate::types::AdapterKind;

impl TryFrom<RawProjectFile> for ProjectFile {
    type Error = SqldagError;

    fn try_from(raw: RawProjectFile) -> std::result::Result<Self, Self::Error> {
        validate_project_section(&raw)?;
        Ok(ProjectFile::new_unchecked(raw.project))
    }
}

fn validate_project_section(raw: &RawProjectFile) -> Result<()> {
    if raw.project.name.trim().is_empty() {
        return Err(SqldagError::ConfigError(
            "[project].name must not be empty".to_string(),
        ));
    }
    if raw.project.profile.trim().is_empty() {
        return Err(SqldagError::ConfigError(
            "[project].profile must not be empty".to_string(),
        ));
    }
    if raw.project.model_paths.is_empty() {
        return Err(SqldagError::ConfigError(
            "[project].model_paths must list at least one directory".to_string(),
        ));
    }
    Ok(())
}

/// Pick the output for `project` from `profiles`.
///
/// `target_override` (from `--target`) wins over the profile's own
/// `target`.
pub fn resolve_output(
    project: ProjectFile,
    mut profiles: RawProfilesFile,
    target_override: Option<&str>,
) -> Result<ProjectConfig> {
    let profile_name = project.project.profile.clone();
    let mut profile = profiles.remove(&profile_name).ok_or_else(|| {
        SqldagError::ConfigError(format!(
            "profile '{}' referenced by [project].profile is not defined",
            profile_name
        ))
    })?;

    let target = target_override
        .map(str::to_string)
        .unwrap_or_else(|| profile.target.clone());

    let output = profile.outputs.remove(&target).ok_or_else(|| {
        SqldagError::ConfigError(format!(
            "profile '{}' has no output named '{}'",
            profile_name, target
        ))
    })?;

    validate_output(&profile_name, &target, &output)?;

    Ok(ProjectConfig {
        project: project.project,
        profile: profile_name,
        target,
        output,
    })
}

fn validate_output(profile: &str, target: &str, output: &OutputConfig) -> Result<()> {
    if output.threads == 0 {
        return Err(SqldagError::ConfigError(format!(
            "[{profile}.outputs.{target}].threads must be >= 1 (got 0)"
        )));
    }

    if output.adapter == AdapterKind::Shell
        && output.command.as_deref().is_none_or(|c| c.trim().is_empty())
    {
        return Err(SqldagError::ConfigError(format!(
            "[{profile}.outputs.{target}] uses type = \"shell\" but has no `command`"
        )));
    }

    Ok(())
}
