// src/watch/watcher.rs

use std::path::PathBuf;
use std::sync::Arc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::watch::detector::ChangeDetector;

/// Handle for the filesystem watcher.
///
/// Dropping this handle stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `dirs` recursively and send the batch of changed model/source
/// files on `changes_tx` whenever file contents actually change.
///
/// Missing directories are skipped.
pub fn spawn_watcher(
    fs: Arc<dyn FileSystem>,
    dirs: Vec<PathBuf>,
    changes_tx: mpsc::Sender<Vec<PathBuf>>,
) -> Result<WatcherHandle> {
    let dirs: Vec<PathBuf> = dirs
        .into_iter()
        .filter(|d| fs.is_dir(d))
        .map(|d| d.canonicalize().unwrap_or(d))
        .collect();
    let mut detector = ChangeDetector::new(fs, dirs.clone())?;

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Err(err) = event_tx.send(event) {
                    eprintln!("sqldag: failed to forward notify event: {err}");
                }
            }
            Err(err) => eprintln!("sqldag: file watch error: {err}"),
        },
        Config::default(),
    )
    .map_err(anyhow::Error::from)?;

    for dir in &dirs {
        watcher
            .watch(dir, RecursiveMode::Recursive)
            .map_err(anyhow::Error::from)?;
        info!(dir = ?dir, "watching model path");
    }
    debug!(files = detector.tracked_files(), "initial file hashes recorded");

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let mut paths = relevant_paths(event);
            // Coalesce bursts (editors often emit several events per save).
            while let Ok(more) = event_rx.try_recv() {
                paths.extend(relevant_paths(more));
            }
            if paths.is_empty() {
                continue;
            }

            let changed = detector.changed_paths(&paths);
            if changed.is_empty() {
                continue;
            }
            if changes_tx.send(changed).await.is_err() {
                warn!("change receiver dropped; stopping watcher loop");
                break;
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher })
}

fn relevant_paths(event: Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any => {
            event.paths
        }
        _ => Vec::new(),
    }
}
