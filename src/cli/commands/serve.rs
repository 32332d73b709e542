//! Serve command - relay, notify server and watchers together.

use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinHandle;

use crate::config::Settings;
use crate::jobs::{CommandRunner, JobQueue, NotifyServer, TaskRunner};
use crate::ports::{ShellPortKiller, release_ports};
use crate::relay::Relay;
use crate::watcher::{ChangeNotifier, TaskWatcher};

/// Arguments for the serve command.
pub struct ServeArgs {
    pub relay_port: Option<u16>,
    pub relay: bool,
    pub notify: bool,
    pub hot_reload: bool,
    pub watch: bool,
    pub release_ports: bool,
}

/// Run the serve command until Ctrl-C.
pub async fn run(args: ServeArgs, config: Settings) -> anyhow::Result<()> {
    let workspace_root = config.root();

    if args.release_ports && !config.ports.is_empty() {
        let report = release_ports(&config.ports, &ShellPortKiller)?;
        if !report.occupied.is_empty() {
            crate::log_event!("ports", "released", "{}", report.occupied.join(", "));
        }
    }

    let relay = if args.relay && config.relay.enabled {
        let port = args.relay_port.unwrap_or(config.relay.port);
        Relay::start(&config.relay.host, port).await
    } else {
        crate::debug_event!("relay", "not started");
        Relay::disabled()
    };

    let runner: Arc<dyn TaskRunner> = Arc::new(CommandRunner::from_config(&config.runner));
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    let notify_server = if args.notify && config.notify_server.enabled {
        let queue = JobQueue::from_config(&config.notify_server, runner.clone())
            .context("Invalid [notify_server.jobs] table")?;
        let server = NotifyServer::start(
            &config.notify_server.address,
            config.notify_server.port,
            queue,
        )
        .await;
        Some(server)
    } else {
        None
    };

    if args.hot_reload && config.hot_reload.enabled {
        let notifier = ChangeNotifier::new(relay.clone(), &workspace_root);
        match notifier.start(&config.hot_reload.paths) {
            Ok(handle) => tasks.push(handle),
            Err(e) => tracing::error!("[hot-reload] failed to start: {e}"),
        }
    }

    if args.watch && config.watch.enabled {
        let watcher = TaskWatcher::from_config(&config.watch, runner.clone(), &workspace_root)
            .context("Invalid [[watch.rules]]")?;
        tasks.push(tokio::spawn(async move {
            if let Err(e) = watcher.watch().await {
                tracing::error!("[watch] stopped: {e}");
            }
        }));
    }

    crate::log_event!("serve", "ready", "press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    crate::log_event!("serve", "shutting down");
    relay.shutdown();
    if let Some(server) = notify_server {
        server.shutdown();
    }
    for task in tasks {
        task.abort();
    }

    Ok(())
}
