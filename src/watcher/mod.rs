//! File watchers for hot reload and rebuild tasks.
//!
//! # Architecture
//!
//! ```text
//! ChangeNotifier                      TaskWatcher
//!   - notify watcher on hot-reload     - notify watcher on workspace root
//!     paths                            - glob rules -> task names
//!   - reads the changed file           - paths settle for debounce_ms
//!   - Notification JSON -> Relay       - settled tasks -> TaskRunner
//! ```

mod error;
mod notification;
mod notifier;
mod source;
mod tasks;

pub use error::WatchError;
pub use notification::{HOT_RELOAD_SENTINEL, Notification, NotificationPayload, normalize_filename};
pub use notifier::ChangeNotifier;
pub use tasks::{TaskWatcher, WatchRule};
