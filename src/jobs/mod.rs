//! Debounced rebuild jobs triggered by external subjects.
//!
//! Another process sends plain-text subjects over UDP. Subjects are matched
//! against a `pattern -> jobs` table; matching jobs accumulate until no new
//! matching subject arrives for the quiet period, then run as one batch.
//!
//! ```text
//! UDP datagram -> NotifyServer -> JobQueue::on_subject
//!                                   |  RuleTable (case-insensitive regex)
//!                                   |  pending set + one debounce timer
//!                                   v
//!                              TaskRunner::run_batch
//! ```

mod error;
mod listener;
mod queue;
mod rules;
mod runner;

pub use error::JobError;
pub use listener::{NotifyServer, send_subject};
pub use queue::JobQueue;
pub use rules::{JobRule, RuleTable};
pub use runner::{CommandRunner, TaskRunner};
