// tests/error_handling.rs

use std::fs;
use std::path::Path;

use sqldag::config::load_and_validate;
use sqldag::errors::SqldagError;
use sqldag::fs::RealFileSystem;
use sqldag_test_utils::builders::ProjectBuilder;
use tempfile::TempDir;

fn write_project(dir: &Path, project: &str, profiles: &str) {
    fs::write(dir.join("sqldag_project.toml"), project).unwrap();
    fs::write(dir.join("profiles.toml"), profiles).unwrap();
}

const PROJECT: &str = r#"
[project]
name = "shop"
profile = "shop"
"#;

#[test]
fn valid_files_resolve_default_target() {
    let dir = TempDir::new().unwrap();
    write_project(
        dir.path(),
        PROJECT,
        r#"
[shop]
target = "dev"

[shop.outputs.dev]
type = "dry_run"
database = "main"
schema = "analytics"

[shop.outputs.prod]
type = "shell"
command = "psql -v ON_ERROR_STOP=1"
threads = 8
database = "prod"
schema = "analytics"
"#,
    );

    let cfg = load_and_validate(&RealFileSystem, dir.path(), dir.path(), None).unwrap();
    assert_eq!(cfg.target, "dev");
    assert_eq!(cfg.output.threads, 1);
    assert_eq!(cfg.project.model_paths, vec!["models".to_string()]);

    let cfg = load_and_validate(&RealFileSystem, dir.path(), dir.path(), Some("prod")).unwrap();
    assert_eq!(cfg.output.threads, 8);
    assert_eq!(cfg.output.database, "prod");
}

#[test]
fn missing_project_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = load_and_validate(&RealFileSystem, dir.path(), dir.path(), None).unwrap_err();
    assert!(err.to_string().contains("sqldag_project.toml"), "{err}");
}

#[test]
fn malformed_toml_returns_toml_error() {
    let dir = TempDir::new().unwrap();
    write_project(dir.path(), "[project\nname = ", "");
    let err = load_and_validate(&RealFileSystem, dir.path(), dir.path(), None).unwrap_err();
    assert!(matches!(err, SqldagError::TomlError(_)), "{err:?}");
}

#[test]
fn unknown_target_returns_config_error() {
    let builder = ProjectBuilder::new("shop");
    let (fs, root) = builder.build();
    let err = load_and_validate(&fs, &root, &root, Some("staging")).unwrap_err();
    match err {
        SqldagError::ConfigError(msg) => assert!(msg.contains("staging"), "{msg}"),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn shell_output_without_command_is_rejected() {
    let dir = TempDir::new().unwrap();
    write_project(
        dir.path(),
        PROJECT,
        r#"
[shop]
target = "dev"

[shop.outputs.dev]
type = "shell"
database = "main"
schema = "analytics"
"#,
    );
    let err = load_and_validate(&RealFileSystem, dir.path(), dir.path(), None).unwrap_err();
    assert!(matches!(err, SqldagError::ConfigError(_)), "{err:?}");
}

#[test]
fn zero_threads_is_rejected() {
    let (fs, root) = ProjectBuilder::new("shop").threads(0).build();
    let err = load_and_validate(&fs, &root, &root, None).unwrap_err();
    assert!(matches!(err, SqldagError::ConfigError(ref m) if m.contains("threads")));
}

#[test]
fn unknown_adapter_type_fails_to_parse() {
    let dir = TempDir::new().unwrap();
    write_project(
        dir.path(),
        PROJECT,
        r#"
[shop]
target = "dev"

[shop.outputs.dev]
type = "snowflake"
database = "main"
schema = "analytics"
"#,
    );
    let err = load_and_validate(&RealFileSystem, dir.path(), dir.path(), None).unwrap_err();
    assert!(matches!(err, SqldagError::TomlError(_)), "{err:?}");
}
