pub mod cli;
pub mod config;
pub mod jobs;
pub mod logging;
pub mod ports;
pub mod relay;
pub mod watcher;

pub use config::Settings;
pub use jobs::{CommandRunner, JobQueue, NotifyServer, RuleTable, TaskRunner};
pub use relay::{ConnectionSet, Relay};
pub use watcher::{ChangeNotifier, Notification, TaskWatcher};
