//! Pushes changed files to browser clients through the relay.

use std::path::{Path, PathBuf};

use notify::Event;
use tokio::task::JoinHandle;

use super::notification::Notification;
use super::source::{self, WatchSource};
use super::WatchError;
use crate::relay::{Message, Relay};

/// Watches hot-reload paths and emits one notification per change.
///
/// Every change sends the full file, even when the contents are unchanged.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    relay: Relay,
    workspace_root: PathBuf,
}

impl ChangeNotifier {
    pub fn new(relay: Relay, workspace_root: &Path) -> Self {
        Self {
            relay,
            workspace_root: source::canonical_root(workspace_root),
        }
    }

    /// Start watching `paths` (relative to the workspace root or absolute).
    ///
    /// The returned task owns the watcher and runs until aborted.
    pub fn start(self, paths: &[PathBuf]) -> Result<JoinHandle<()>, WatchError> {
        let resolved: Vec<PathBuf> = paths
            .iter()
            .map(|p| source::resolve(&self.workspace_root, p))
            .collect();

        let source = WatchSource::new("hot-reload", &resolved)?;
        if source.watched == 0 {
            tracing::warn!("[hot-reload] none of the configured paths could be watched");
        } else {
            crate::log_event!("hot-reload", "monitoring", "{} paths", source.watched);
        }

        Ok(tokio::spawn(self.run(source)))
    }

    async fn run(self, mut source: WatchSource) {
        while let Some(res) = source.events.recv().await {
            match res {
                Ok(event) => self.handle_event(event),
                Err(e) => tracing::error!("[hot-reload] file watch error: {e}"),
            }
        }
        crate::debug_event!("hot-reload", "event channel closed");
    }

    fn handle_event(&self, event: Event) {
        if !source::is_content_change(&event.kind) {
            return;
        }
        for path in &event.paths {
            if path.is_dir() {
                continue;
            }
            self.notify_change(path);
        }
    }

    /// Read `path` and broadcast it. Returns the number of clients reached.
    ///
    /// A failed read is logged and nothing is sent.
    pub fn notify_change(&self, path: &Path) -> usize {
        match self.build_message(path) {
            Ok(message) => {
                crate::log_event!("hot-reload", "changed", "{}", path.display());
                self.relay.inject(message)
            }
            Err(e) => {
                tracing::warn!("[hot-reload] {e}");
                0
            }
        }
    }

    fn build_message(&self, path: &Path) -> Result<Message, WatchError> {
        let contents = std::fs::read_to_string(path).map_err(|source| WatchError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let notification = Notification::for_path(path, &self.workspace_root, contents);
        Ok(Message::text(notification.to_json()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_change_is_broadcast_as_hot_reload_json() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("app.css");
        fs::write(&file, "body { color: red }").unwrap();

        let relay = Relay::bind("127.0.0.1:0").await.unwrap();
        let (_, mut rx) = relay.connections().register();

        let notifier = ChangeNotifier::new(relay.clone(), temp_dir.path());
        let delivered = notifier.notify_change(&notifier.workspace_root.join("app.css"));
        assert_eq!(delivered, 1);

        let Message::Text(text) = rx.try_recv().unwrap() else {
            panic!("expected a text frame");
        };
        let notification: Notification = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(notification, Notification::new("app.css", "body { color: red }"));
        relay.shutdown();
    }

    #[tokio::test]
    async fn test_missing_file_sends_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let relay = Relay::bind("127.0.0.1:0").await.unwrap();
        let (_, mut rx) = relay.connections().register();

        let notifier = ChangeNotifier::new(relay.clone(), temp_dir.path());
        assert_eq!(notifier.notify_change(&temp_dir.path().join("gone.js")), 0);
        assert!(rx.try_recv().is_err());
        relay.shutdown();
    }

    #[tokio::test]
    async fn test_disabled_relay_is_a_no_op() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a.js");
        fs::write(&file, "x").unwrap();

        let notifier = ChangeNotifier::new(Relay::disabled(), temp_dir.path());
        assert_eq!(notifier.notify_change(&file), 0);
    }
}
