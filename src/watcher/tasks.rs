//! Glob rules that start build tasks when matching files change.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::{MatchOptions, Pattern};
use indexmap::{IndexMap, IndexSet};
use notify::{Event, EventKind};
use tokio::time::{Duration, Instant, interval};

use super::source::{self, WatchSource};
use super::WatchError;
use crate::config::{WatchConfig, WatchRuleConfig};
use crate::jobs::TaskRunner;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// How often settled paths are collected.
const FLUSH_INTERVAL: Duration = Duration::from_millis(100);

/// Files matching any pattern start the listed tasks.
#[derive(Debug, Clone)]
pub struct WatchRule {
    patterns: Vec<Pattern>,
    tasks: Vec<String>,
}

impl WatchRule {
    pub fn new(patterns: &[String], tasks: Vec<String>) -> Result<Self, WatchError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|source| WatchError::InvalidPattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns, tasks })
    }

    pub fn from_config(config: &WatchRuleConfig) -> Result<Self, WatchError> {
        Self::new(&config.patterns, config.tasks.clone())
    }

    /// Match a workspace-relative path.
    pub fn matches(&self, relative: &Path) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_path_with(relative, MATCH_OPTIONS))
    }
}

/// Watches the workspace and runs the tasks of settled files as one batch.
///
/// A path settles once it has gone `debounce_ms` without another change,
/// so the several writes an editor makes per save count once.
pub struct TaskWatcher {
    rules: Vec<WatchRule>,
    quiet_period: Duration,
    /// path -> last change, in first-seen order.
    settling: IndexMap<PathBuf, Instant>,
    runner: Arc<dyn TaskRunner>,
    workspace_root: PathBuf,
}

impl TaskWatcher {
    pub fn new(
        rules: Vec<WatchRule>,
        debounce_ms: u64,
        runner: Arc<dyn TaskRunner>,
        workspace_root: &Path,
    ) -> Self {
        Self {
            rules,
            quiet_period: Duration::from_millis(debounce_ms),
            settling: IndexMap::new(),
            runner,
            workspace_root: source::canonical_root(workspace_root),
        }
    }

    pub fn from_config(
        config: &WatchConfig,
        runner: Arc<dyn TaskRunner>,
        workspace_root: &Path,
    ) -> Result<Self, WatchError> {
        let rules = config
            .rules
            .iter()
            .map(WatchRule::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(rules, config.debounce_ms, runner, workspace_root))
    }

    fn relative<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.workspace_root).unwrap_or(path)
    }

    fn is_tracked(&self, path: &Path) -> bool {
        let relative = self.relative(path);
        self.rules.iter().any(|rule| rule.matches(relative))
    }

    /// Union of the tasks for `paths`, in first-seen order.
    pub fn tasks_for(&self, paths: &[PathBuf]) -> Vec<String> {
        let mut tasks = IndexSet::new();
        for path in paths {
            let relative = self.relative(path);
            for rule in self.rules.iter().filter(|rule| rule.matches(relative)) {
                tasks.extend(rule.tasks.iter().cloned());
            }
        }
        tasks.into_iter().collect()
    }

    /// Restart the quiet period of tracked paths, or forget deleted ones.
    fn handle_event(&mut self, event: Event) {
        for path in event.paths {
            if !self.is_tracked(&path) {
                continue;
            }

            if matches!(event.kind, EventKind::Remove(_)) {
                self.settling.shift_remove(&path);
            } else if source::is_content_change(&event.kind) {
                // Re-inserting keeps the original position
                self.settling.insert(path, Instant::now());
            }
        }
    }

    /// Remove and return every path quiet for the full period.
    fn take_settled(&mut self) -> Vec<PathBuf> {
        let now = Instant::now();
        let quiet_period = self.quiet_period;
        let mut settled = Vec::new();

        self.settling.retain(|path, last_change| {
            if now.duration_since(*last_change) >= quiet_period {
                settled.push(path.clone());
                false
            } else {
                true
            }
        });

        settled
    }

    /// Run the tasks of every settled path. Returns the batch, if any.
    async fn flush(&mut self) -> Option<Vec<String>> {
        let ready = self.take_settled();
        if ready.is_empty() {
            return None;
        }

        for path in &ready {
            crate::log_event!("watch", "changed", "{}", self.relative(path).display());
        }

        let tasks = self.tasks_for(&ready);
        if tasks.is_empty() {
            return None;
        }
        self.runner.run_batch(tasks.clone()).await;
        Some(tasks)
    }

    /// Watch the workspace root until the event channel closes.
    pub async fn watch(mut self) -> Result<(), WatchError> {
        if self.rules.is_empty() {
            tracing::warn!("[watch] no watch rules configured");
            return Ok(());
        }

        let mut source = WatchSource::new("watch", &[self.workspace_root.clone()])?;
        crate::log_event!(
            "watch",
            "started",
            "{} rules under {}",
            self.rules.len(),
            self.workspace_root.display()
        );

        let mut ticker = interval(FLUSH_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                res = source.events.recv() => match res {
                    Some(Ok(event)) => self.handle_event(event),
                    Some(Err(e)) => tracing::error!("[watch] file watch error: {e}"),
                    None => break,
                },
                _ = ticker.tick() => {
                    self.flush().await;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind};
    use parking_lot::Mutex;
    use tokio::time::advance;

    #[derive(Default)]
    struct RecordingRunner {
        batches: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl TaskRunner for RecordingRunner {
        async fn run_batch(&self, jobs: Vec<String>) {
            self.batches.lock().push(jobs);
        }
    }

    fn rule(patterns: &[&str], tasks: &[&str]) -> WatchRule {
        WatchRule::new(
            &patterns.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
            tasks.iter().map(|t| t.to_string()).collect(),
        )
        .unwrap()
    }

    fn watcher(debounce_ms: u64) -> (TaskWatcher, Arc<RecordingRunner>) {
        let runner = Arc::new(RecordingRunner::default());
        let rules = vec![
            rule(&["app/**/*.js", "app/**/*.jsx"], &["app_build"]),
            rule(&["app/**/*.less", "less/*.less"], &["less"]),
            rule(&["app/**/*.js"], &["app_build", "locale_build"]),
        ];
        let watcher = TaskWatcher::new(rules, debounce_ms, runner.clone(), Path::new("/work"));
        (watcher, runner)
    }

    fn modified(path: &str) -> Event {
        Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from(path))
    }

    fn batch(tasks: &[&str]) -> Option<Vec<String>> {
        Some(tasks.iter().map(|t| t.to_string()).collect())
    }

    #[test]
    fn test_rule_matches_relative_paths() {
        let r = rule(&["app/**/*.js"], &["app_build"]);

        assert!(r.matches(Path::new("app/page/home.js")));
        assert!(!r.matches(Path::new("vendor/lib.js")));
        assert!(!r.matches(Path::new("app/page/home.css")));
    }

    #[test]
    fn test_invalid_glob_is_rejected() {
        let err = WatchRule::new(&["app/[".to_string()], vec![]).unwrap_err();
        assert!(matches!(err, WatchError::InvalidPattern { .. }));
    }

    #[test]
    fn test_tasks_are_deduplicated_across_paths() {
        let (watcher, _) = watcher(0);

        let tasks = watcher.tasks_for(&[
            PathBuf::from("/work/app/page/home.js"),
            PathBuf::from("/work/less/site.less"),
            PathBuf::from("/work/app/page/list.js"),
        ]);
        assert_eq!(tasks, vec!["app_build", "locale_build", "less"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_changes_run_one_batch() {
        let (mut watcher, runner) = watcher(300);

        watcher.handle_event(modified("/work/app/page/home.js"));
        watcher.handle_event(modified("/work/less/site.less"));
        watcher.handle_event(modified("/work/docs/readme.md"));

        // Untracked files never enter the quiet period
        assert_eq!(watcher.settling.len(), 2);
        assert_eq!(watcher.flush().await, None);

        advance(Duration::from_millis(300)).await;
        assert_eq!(
            watcher.flush().await,
            batch(&["app_build", "locale_build", "less"])
        );
        assert_eq!(runner.batches.lock().len(), 1);

        // Nothing left to run
        assert_eq!(watcher.flush().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_writes_restart_quiet_period() {
        let (mut watcher, runner) = watcher(300);

        watcher.handle_event(modified("/work/less/site.less"));
        advance(Duration::from_millis(200)).await;
        watcher.handle_event(modified("/work/less/site.less"));
        advance(Duration::from_millis(200)).await;

        // 400ms since the first write, 200ms since the last
        assert_eq!(watcher.flush().await, None);
        assert_eq!(watcher.settling.len(), 1);

        advance(Duration::from_millis(100)).await;
        assert_eq!(watcher.flush().await, batch(&["less"]));
        assert_eq!(runner.batches.lock().as_slice(), &[vec!["less".to_string()]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paths_settle_independently() {
        let (mut watcher, _) = watcher(300);

        watcher.handle_event(modified("/work/less/site.less"));
        advance(Duration::from_millis(200)).await;
        watcher.handle_event(modified("/work/app/page/main.jsx"));
        advance(Duration::from_millis(100)).await;

        assert_eq!(watcher.flush().await, batch(&["less"]));

        advance(Duration::from_millis(200)).await;
        assert_eq!(watcher.flush().await, batch(&["app_build"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deleted_file_is_not_rebuilt() {
        let (mut watcher, runner) = watcher(300);

        watcher.handle_event(
            Event::new(EventKind::Create(CreateKind::File))
                .add_path(PathBuf::from("/work/less/tmp.less")),
        );
        watcher.handle_event(
            Event::new(EventKind::Remove(RemoveKind::File))
                .add_path(PathBuf::from("/work/less/tmp.less")),
        );

        advance(Duration::from_millis(300)).await;
        assert_eq!(watcher.flush().await, None);
        assert!(runner.batches.lock().is_empty());
    }
}
