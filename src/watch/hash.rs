// src/watch/hash.rs

//! Content hashing with `blake3`.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;

use crate::fs::FileSystem;

/// Hex digest of a single file's contents.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut reader = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = reader
            .read(&mut buf)
            .with_context(|| format!("reading file for hashing: {:?}", path))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn equal_content_hashes_equal() {
        let fs = MockFileSystem::new();
        fs.add_file("/a.sql", "select 1");
        fs.add_file("/b.sql", "select 1");
        fs.add_file("/c.sql", "select 2");

        let a = compute_file_hash(&fs, Path::new("/a.sql")).unwrap();
        let b = compute_file_hash(&fs, Path::new("/b.sql")).unwrap();
        let c = compute_file_hash(&fs, Path::new("/c.sql")).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(compute_file_hash(&fs, Path::new("/missing.sql")).is_err());
    }
}
