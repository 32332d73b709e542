//! notify watcher setup shared by the change notifier and task watcher.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use notify::event::ModifyKind;
use tokio::sync::mpsc;

use super::WatchError;

pub(crate) type EventReceiver = mpsc::Receiver<notify::Result<Event>>;

/// A live notify watcher and the channel its events arrive on.
///
/// Dropping the source stops the watch.
pub(crate) struct WatchSource {
    _watcher: RecommendedWatcher,
    pub events: EventReceiver,
    pub watched: usize,
}

impl WatchSource {
    /// Watch `paths`; directories recursively, files on their own.
    ///
    /// Paths that cannot be watched are logged and skipped.
    pub fn new(component: &str, paths: &[PathBuf]) -> Result<Self, WatchError> {
        let (tx, rx) = mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })?;

        let mut watched = 0;
        for path in paths {
            let mode = if path.is_dir() {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };

            match watcher.watch(path, mode) {
                Ok(()) => {
                    watched += 1;
                    crate::debug_event!(component, "watching", "{}", path.display());
                }
                Err(e) => {
                    let e = WatchError::PathWatchFailed {
                        path: path.clone(),
                        reason: e.to_string(),
                    };
                    tracing::warn!("[{component}] {e}");
                }
            }
        }

        Ok(Self {
            _watcher: watcher,
            events: rx,
            watched,
        })
    }
}

/// Whether an event reports new or changed file contents.
pub(crate) fn is_content_change(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) => true,
        EventKind::Modify(ModifyKind::Metadata(_)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}

/// Resolve a configured path against the workspace root.
pub(crate) fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Canonical form of the workspace root, so it prefixes notify's paths.
pub(crate) fn canonical_root(root: &Path) -> PathBuf {
    root.canonicalize().unwrap_or_else(|_| root.to_path_buf())
}
