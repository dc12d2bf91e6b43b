// src/watch/detector.rs

//! Turns raw filesystem events into "the project changed" decisions.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::project::discover::ResourceMatcher;
use crate::watch::cache::FileCache;

/// Tracks model and source files below a set of model directories.
#[derive(Debug)]
pub struct ChangeDetector {
    dirs: Vec<PathBuf>,
    matcher: ResourceMatcher,
    cache: FileCache,
}

impl ChangeDetector {
    /// Hash every model/source file currently present in `dirs`.
    pub fn new(fs: Arc<dyn FileSystem>, dirs: Vec<PathBuf>) -> Result<Self> {
        let matcher = ResourceMatcher::new()?;
        let mut cache = FileCache::new(fs.clone());

        let mut tracked = Vec::new();
        for dir in &dirs {
            for path in fs.walk_files(dir)? {
                let relevant = path
                    .strip_prefix(dir)
                    .is_ok_and(|rel| matcher.classify(rel).is_some());
                if relevant {
                    tracked.push(path);
                }
            }
        }
        cache.prime(tracked.iter())?;

        Ok(Self {
            dirs,
            matcher,
            cache,
        })
    }

    pub fn tracked_files(&self) -> usize {
        self.cache.len()
    }

    /// Subset of `paths` that are model/source files whose content changed.
    pub fn changed_paths(&mut self, paths: &[PathBuf]) -> Vec<PathBuf> {
        let mut changed = Vec::new();

        for path in paths {
            let Some(rel) = self.relative_to_dirs(path) else {
                debug!(path = ?path, "event outside model paths");
                continue;
            };
            if self.matcher.classify(&rel).is_none() {
                continue;
            }

            match self.cache.refresh(path) {
                Ok(true) => changed.push(path.clone()),
                Ok(false) => debug!(path = ?path, "content unchanged; ignoring event"),
                Err(err) => warn!(path = ?path, error = %err, "failed to hash changed file"),
            }
        }

        changed.sort();
        changed.dedup();
        changed
    }

    fn relative_to_dirs(&self, path: &Path) -> Option<PathBuf> {
        for dir in &self.dirs {
            if let Ok(rel) = path.strip_prefix(dir) {
                return Some(rel.to_path_buf());
            }
        }

        // Event paths may use a different absolute prefix for the same
        // directory (symlinks, /private/var on macOS).
        let canon = path
            .parent()
            .and_then(|p| p.canonicalize().ok())
            .zip(path.file_name())
            .map(|(parent, name)| parent.join(name))?;
        self.dirs.iter().find_map(|dir| {
            let dir = dir.canonicalize().ok()?;
            canon.strip_prefix(&dir).ok().map(Path::to_path_buf)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn detector(fs: &MockFileSystem) -> ChangeDetector {
        ChangeDetector::new(Arc::new(fs.clone()), vec![PathBuf::from("/p/models")]).unwrap()
    }

    #[test]
    fn primes_existing_model_files() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/models/a.sql", "select 1");
        fs.add_file("/p/models/sources.toml", "");
        fs.add_file("/p/models/README.md", "docs");
        let d = detector(&fs);
        assert_eq!(d.tracked_files(), 2);
    }

    #[test]
    fn reports_only_relevant_content_changes() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/models/a.sql", "select 1");
        fs.add_file("/p/models/b.sql", "select 2");
        let mut d = detector(&fs);

        fs.add_file("/p/models/a.sql", "select 10");
        fs.add_file("/p/models/README.md", "changed docs");
        fs.add_file("/p/other/x.sql", "select 3");

        let changed = d.changed_paths(&[
            PathBuf::from("/p/models/a.sql"),
            PathBuf::from("/p/models/a.sql"),
            PathBuf::from("/p/models/b.sql"),
            PathBuf::from("/p/models/README.md"),
            PathBuf::from("/p/other/x.sql"),
        ]);
        assert_eq!(changed, vec![PathBuf::from("/p/models/a.sql")]);
    }

    #[test]
    fn removal_is_a_change() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/models/a.sql", "select 1");
        let mut d = detector(&fs);

        fs.remove_file("/p/models/a.sql");
        let changed = d.changed_paths(&[PathBuf::from("/p/models/a.sql")]);
        assert_eq!(changed, vec![PathBuf::from("/p/models/a.sql")]);
    }
}
