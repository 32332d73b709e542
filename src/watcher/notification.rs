//! Hot-reload notification record sent to browser clients.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Tag identifying the hot-reload schema to receivers.
pub const HOT_RELOAD_SENTINEL: &str = "watch/hot-reload";

/// One changed file, serialized as
/// `{"sentinel": "...", "payload": {"filename": "...", "contents": "..."}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub sentinel: String,
    pub payload: NotificationPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    /// Forward-slash path of the changed file.
    pub filename: String,
    pub contents: String,
}

impl Notification {
    pub fn new(filename: &str, contents: impl Into<String>) -> Self {
        Self {
            sentinel: HOT_RELOAD_SENTINEL.to_string(),
            payload: NotificationPayload {
                filename: normalize_filename(filename),
                contents: contents.into(),
            },
        }
    }

    /// Build a notification for `path`, relative to `root` when inside it.
    pub fn for_path(path: &Path, root: &Path, contents: impl Into<String>) -> Self {
        let relative = path.strip_prefix(root).unwrap_or(path);
        Self::new(&relative.to_string_lossy(), contents)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Convert backslash separators to forward slashes.
pub fn normalize_filename(filename: &str) -> String {
    filename.replace('\\', "/")
}
