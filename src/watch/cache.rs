// src/watch/cache.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use crate::fs::FileSystem;
use crate::watch::hash::compute_file_hash;

/// Last known content hash of every watched file.
///
/// Editors often touch files without changing them; only a differing
/// hash counts as a change.
#[derive(Debug)]
pub struct FileCache {
    fs: Arc<dyn FileSystem>,
    hashes: HashMap<PathBuf, String>,
}

impl FileCache {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            hashes: HashMap::new(),
        }
    }

    /// Record the current hash of each path without reporting changes.
    pub fn prime<'a>(&mut self, paths: impl IntoIterator<Item = &'a PathBuf>) -> Result<()> {
        for path in paths {
            let hash = compute_file_hash(self.fs.as_ref(), path)?;
            self.hashes.insert(path.clone(), hash);
        }
        debug!(files = self.hashes.len(), "primed file cache");
        Ok(())
    }

    /// Re-hash `path` and report whether its content differs from the
    /// cached state.
    ///
    /// A file that disappeared counts as changed if it was known; a new
    /// file counts as changed.
    pub fn refresh(&mut self, path: &Path) -> Result<bool> {
        if !self.fs.is_file(path) {
            let known = self.hashes.remove(path).is_some();
            if known {
                debug!(path = ?path, "watched file removed");
            }
            return Ok(known);
        }

        let hash = compute_file_hash(self.fs.as_ref(), path)?;
        let changed = self.hashes.get(path) != Some(&hash);
        if changed {
            debug!(path = ?path, hash = %hash, "file content changed");
            self.hashes.insert(path.to_path_buf(), hash);
        }
        Ok(changed)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn only_content_changes_are_reported() {
        let fs = MockFileSystem::new();
        fs.add_file("/m/a.sql", "select 1");
        let mut cache = FileCache::new(Arc::new(fs.clone()));
        cache.prime([&PathBuf::from("/m/a.sql")]).unwrap();

        // Touch with identical content.
        fs.add_file("/m/a.sql", "select 1");
        assert!(!cache.refresh(Path::new("/m/a.sql")).unwrap());

        fs.add_file("/m/a.sql", "select 2");
        assert!(cache.refresh(Path::new("/m/a.sql")).unwrap());
        assert!(!cache.refresh(Path::new("/m/a.sql")).unwrap());
    }

    #[test]
    fn new_and_removed_files_are_changes() {
        let fs = MockFileSystem::new();
        let mut cache = FileCache::new(Arc::new(fs.clone()));

        fs.add_file("/m/b.sql", "select 1");
        assert!(cache.refresh(Path::new("/m/b.sql")).unwrap());
        assert_eq!(cache.len(), 1);

        fs.remove_file("/m/b.sql");
        assert!(cache.refresh(Path::new("/m/b.sql")).unwrap());
        assert!(cache.is_empty());

        // Unknown and absent: nothing happened.
        assert!(!cache.refresh(Path::new("/m/c.sql")).unwrap());
    }
}
