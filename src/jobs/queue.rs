//! Debounced job queue.
//!
//! Bursts of matching subjects collapse into one batch: every match merges
//! its jobs into the pending set and re-arms the single timer, so the batch
//! fires one quiet period after the *last* matching subject.

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexSet;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::rules::RuleTable;
use super::runner::TaskRunner;
use super::JobError;
use crate::config::NotifyServerConfig;

/// Handle to the job queue. Clones share the same pending set and timer.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

struct QueueInner {
    rules: RuleTable,
    quiet_period: Duration,
    runner: Arc<dyn TaskRunner>,
    state: Mutex<QueueState>,
}

#[derive(Default)]
struct QueueState {
    pending: IndexSet<String>,
    timer: Option<JoinHandle<()>>,
    /// Bumped on every re-arm; a timer only fires if it is still current.
    generation: u64,
}

impl JobQueue {
    pub fn new(rules: RuleTable, quiet_period: Duration, runner: Arc<dyn TaskRunner>) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                rules,
                quiet_period,
                runner,
                state: Mutex::new(QueueState::default()),
            }),
        }
    }

    pub fn from_config(
        config: &NotifyServerConfig,
        runner: Arc<dyn TaskRunner>,
    ) -> Result<Self, JobError> {
        let rules = RuleTable::from_config(&config.jobs)?;
        if rules.is_empty() {
            tracing::warn!("[jobs] no job rules configured, subjects will be ignored");
        } else {
            crate::debug_event!("jobs", "loaded", "{} rules", rules.len());
        }
        Ok(Self::new(
            rules,
            Duration::from_millis(config.debounce_ms),
            runner,
        ))
    }

    /// Merge the jobs matching `subject` and restart the quiet period.
    ///
    /// Returns `false` without touching the timer when no rule matches.
    /// Must be called from within a tokio runtime.
    pub fn on_subject(&self, subject: &str) -> bool {
        let jobs = self.inner.rules.matching_jobs(subject);
        if jobs.is_empty() {
            return false;
        }

        let mut state = self.inner.state.lock();
        state.pending.extend(jobs);

        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation += 1;

        let generation = state.generation;
        let inner = Arc::clone(&self.inner);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.quiet_period).await;
            inner.fire(generation).await;
        }));

        crate::log_event!(
            "jobs",
            "queued",
            "{subject} -> [{}]",
            state.pending.iter().cloned().collect::<Vec<_>>().join(", ")
        );
        true
    }

    /// Jobs waiting for the current quiet period to end.
    pub fn pending(&self) -> Vec<String> {
        self.inner.state.lock().pending.iter().cloned().collect()
    }

    /// Whether a batch is scheduled.
    pub fn has_timer(&self) -> bool {
        self.inner.state.lock().timer.is_some()
    }
}

impl QueueInner {
    async fn fire(&self, generation: u64) {
        let jobs = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            state.timer = None;
            std::mem::take(&mut state.pending)
        };

        if jobs.is_empty() {
            return;
        }

        crate::log_event!("jobs", "running batch", "{} jobs", jobs.len());
        self.runner.run_batch(jobs.into_iter().collect()).await;
    }
}
