// src/project/discover.rs

//! Locating model and source files below the configured model paths.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, trace};

use crate::config::load_sources_file;
use crate::errors::{Result, SqldagError};
use crate::fs::FileSystem;
use crate::project::resolver::{Relation, SourceMap};

const MODEL_GLOB: &str = "**/*.sql";
const SOURCES_GLOB: &str = "**/*.toml";

/// What a file below a model path contributes to the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Model,
    Sources,
}

/// Classifies paths relative to a model directory.
#[derive(Debug, Clone)]
pub struct ResourceMatcher {
    set: GlobSet,
}

impl ResourceMatcher {
    pub fn new() -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in [MODEL_GLOB, SOURCES_GLOB] {
            let glob = Glob::new(pattern)
                .with_context(|| format!("invalid glob pattern: {pattern}"))?;
            builder.add(glob);
        }
        let set = builder.build().context("building resource globset")?;
        Ok(Self { set })
    }

    pub fn classify(&self, rel_path: &Path) -> Option<ResourceKind> {
        match self.set.matches(rel_path).first() {
            Some(0) => Some(ResourceKind::Model),
            Some(1) => Some(ResourceKind::Sources),
            _ => None,
        }
    }
}

/// One `*.sql` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFile {
    pub name: String,
    pub path: PathBuf,
    pub raw_sql: String,
}

/// Everything found below the model paths, before references are resolved.
#[derive(Debug, Clone, Default)]
pub struct Discovered {
    pub models: BTreeMap<String, ModelFile>,
    pub sources: SourceMap,
}

/// Walk each of `model_paths` (relative to `root`) and collect models and
/// source declarations.
///
/// Model names are file stems and must be unique across all model paths.
/// A `(namespace, table)` pair may be declared more than once only if every
/// declaration agrees on the relation.
pub fn discover(fs: &dyn FileSystem, root: &Path, model_paths: &[String]) -> Result<Discovered> {
    let matcher = ResourceMatcher::new()?;
    let mut found = Discovered::default();

    for model_path in model_paths {
        let dir = root.join(model_path);
        if !fs.is_dir(&dir) {
            debug!(dir = ?dir, "model path does not exist; skipping");
            continue;
        }

        for path in fs.walk_files(&dir)? {
            let rel = path.strip_prefix(&dir).unwrap_or(&path);
            match matcher.classify(rel) {
                Some(ResourceKind::Model) => add_model(fs, &mut found, path)?,
                Some(ResourceKind::Sources) => add_sources(fs, &mut found, &path)?,
                None => trace!(path = ?path, "ignoring file"),
            }
        }
    }

    debug!(
        models = found.models.len(),
        sources = found.sources.len(),
        "discovered project resources"
    );
    Ok(found)
}

fn add_model(fs: &dyn FileSystem, found: &mut Discovered, path: PathBuf) -> Result<()> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SqldagError::ConfigError(format!("invalid model file name: {path:?}")))?
        .to_string();

    if let Some(existing) = found.models.get(&name) {
        return Err(SqldagError::DuplicateModel {
            name,
            first: existing.path.display().to_string(),
            second: path.display().to_string(),
        });
    }

    let raw_sql = fs.read_to_string(&path)?;
    trace!(model = %name, path = ?path, "found model");
    found.models.insert(name.clone(), ModelFile { name, path, raw_sql });
    Ok(())
}

fn add_sources(fs: &dyn FileSystem, found: &mut Discovered, path: &Path) -> Result<()> {
    let file = load_sources_file(fs, path)?;

    for namespace in file.sources {
        for table in &namespace.tables {
            let relation = Relation::new(&namespace.database, &namespace.schema, table);
            let key = (namespace.name.clone(), table.clone());

            match found.sources.get(&key) {
                Some(existing) if *existing != relation => {
                    return Err(SqldagError::ConfigError(format!(
                        "source '{}.{}' declared as both {} and {} ({:?})",
                        key.0, key.1, existing, relation, path
                    )));
                }
                Some(_) => {}
                None => {
                    found.sources.insert(key, relation);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn models() -> Vec<String> {
        vec!["models".to_string()]
    }

    #[test]
    fn classifies_by_extension() {
        let m = ResourceMatcher::new().unwrap();
        assert_eq!(m.classify(Path::new("a.sql")), Some(ResourceKind::Model));
        assert_eq!(m.classify(Path::new("staging/a.sql")), Some(ResourceKind::Model));
        assert_eq!(m.classify(Path::new("staging/sources.toml")), Some(ResourceKind::Sources));
        assert_eq!(m.classify(Path::new("README.md")), None);
    }

    #[test]
    fn finds_models_in_nested_directories() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/models/a.sql", "select 1");
        fs.add_file("/p/models/staging/b.sql", "select 2");
        fs.add_file("/p/models/notes.md", "ignored");

        let found = discover(&fs, Path::new("/p"), &models()).unwrap();
        let names: Vec<_> = found.models.keys().cloned().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(found.models["b"].raw_sql, "select 2");
    }

    #[test]
    fn duplicate_model_names_report_both_paths() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/models/a.sql", "select 1");
        fs.add_file("/p/models/staging/a.sql", "select 2");

        let err = discover(&fs, Path::new("/p"), &models()).unwrap_err();
        match err {
            SqldagError::DuplicateModel { name, first, second } => {
                assert_eq!(name, "a");
                assert_ne!(first, second);
            }
            other => panic!("expected duplicate model error, got {other:?}"),
        }
    }

    #[test]
    fn collects_sources() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/p/models/sources.toml",
            r#"
[[sources]]
name = "raw"
database = "raw_db"
schema = "public"
tables = ["orders", "customers"]
"#,
        );

        let found = discover(&fs, Path::new("/p"), &models()).unwrap();
        assert_eq!(found.sources.len(), 2);
        assert_eq!(
            found.sources[&("raw".to_string(), "orders".to_string())].to_string(),
            "raw_db.public.orders"
        );
    }

    #[test]
    fn conflicting_source_declarations_are_rejected() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "/p/models/a.toml",
            "[[sources]]\nname = \"raw\"\ndatabase = \"d1\"\nschema = \"s\"\ntables = [\"t\"]\n",
        );
        fs.add_file(
            "/p/models/b.toml",
            "[[sources]]\nname = \"raw\"\ndatabase = \"d2\"\nschema = \"s\"\ntables = [\"t\"]\n",
        );

        let err = discover(&fs, Path::new("/p"), &models()).unwrap_err();
        assert!(matches!(err, SqldagError::ConfigError(_)));
    }

    #[test]
    fn missing_model_path_is_empty() {
        let fs = MockFileSystem::new();
        fs.add_dir("/p");
        let found = discover(&fs, Path::new("/p"), &models()).unwrap();
        assert!(found.models.is_empty());
    }
}
