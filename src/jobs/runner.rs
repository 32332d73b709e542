//! External task runner invocation.

use async_trait::async_trait;
use tokio::process::Command;

use super::JobError;
use crate::config::RunnerConfig;

/// Runs one batch of named tasks.
///
/// Called once per settled batch with a non-empty, duplicate-free job list.
#[async_trait]
pub trait TaskRunner: Send + Sync {
    async fn run_batch(&self, jobs: Vec<String>);
}

/// Spawns `program [args...] job1 job2 ...` once per batch.
///
/// Failures are logged; the caller never sees them.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
    args: Vec<String>,
}

impl CommandRunner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    /// Full argument list for a batch.
    fn command_args(&self, jobs: &[String]) -> Vec<String> {
        self.args.iter().chain(jobs).cloned().collect()
    }

    async fn run(&self, jobs: &[String]) -> Result<std::process::ExitStatus, JobError> {
        Command::new(&self.program)
            .args(self.command_args(jobs))
            .status()
            .await
            .map_err(|source| JobError::Spawn {
                program: self.program.clone(),
                source,
            })
    }
}

#[async_trait]
impl TaskRunner for CommandRunner {
    async fn run_batch(&self, jobs: Vec<String>) {
        crate::log_event!("runner", "starting", "{} {}", self.program, jobs.join(" "));

        match self.run(&jobs).await {
            Ok(status) if status.success() => {
                crate::log_event!("runner", "finished", "{}", jobs.join(", "));
            }
            Ok(status) => {
                tracing::warn!("[runner] {} exited with {status}", self.program);
            }
            Err(e) => {
                tracing::error!("[runner] {e}");
            }
        }
    }
}
