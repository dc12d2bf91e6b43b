// src/watch/mod.rs

//! File watching and change detection for `sqldag watch`.
//!
//! - [`hash`] computes `blake3` content digests.
//! - [`cache`] remembers the last digest of every watched file.
//! - [`detector`] filters raw events down to real model/source changes.
//! - [`watcher`] wires a `notify` watcher to a tokio channel.

pub mod cache;
pub mod detector;
pub mod hash;
pub mod watcher;

pub use cache::FileCache;
pub use detector::ChangeDetector;
pub use hash::compute_file_hash;
pub use watcher::{WatcherHandle, spawn_watcher};
