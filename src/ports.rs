//! Release ports still held by stale dev processes.
//!
//! Each entry of the `[ports]` table is probed by trying to bind it. Ports
//! that are in use get a best-effort platform kill command.

use std::io::ErrorKind;
use std::net::TcpListener;
use std::process::Command;

use indexmap::IndexMap;
use thiserror::Error;

/// Errors from probing or freeing a port.
#[derive(Error, Debug)]
pub enum PortError {
    #[error("Cannot probe port {port}: {source}")]
    Probe {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Kill command for port {port} failed: {reason}")]
    Kill { port: u16, reason: String },
}

/// Whether something is already listening on `port`.
///
/// Only "address in use" counts as occupied; other bind errors are returned.
pub fn is_port_occupied(port: u16) -> Result<bool, PortError> {
    match TcpListener::bind(("0.0.0.0", port)) {
        Ok(_listener) => Ok(false),
        Err(e) if e.kind() == ErrorKind::AddrInUse => Ok(true),
        Err(source) => Err(PortError::Probe { port, source }),
    }
}

/// Frees a port by terminating whatever holds it.
pub trait PortKiller {
    fn kill(&self, port: u16) -> Result<(), PortError>;
}

/// Kills the owning process through the platform shell.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellPortKiller;

impl ShellPortKiller {
    #[cfg(not(windows))]
    fn command(port: u16) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(format!("lsof -ti tcp:{port} | xargs kill -9"));
        cmd
    }

    #[cfg(windows)]
    fn command(port: u16) -> Command {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(format!(
            "FOR /F \"tokens=5\" %P IN ('netstat -ano ^| findstr :{port} ^| findstr LISTENING') DO taskkill /F /PID %P"
        ));
        cmd
    }
}

impl PortKiller for ShellPortKiller {
    fn kill(&self, port: u16) -> Result<(), PortError> {
        let output = Self::command(port).output().map_err(|e| PortError::Kill {
            port,
            reason: e.to_string(),
        })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(PortError::Kill {
                port,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Outcome of a release pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    /// Owners whose port was found occupied, in table order.
    pub occupied: Vec<String>,
}

/// Probe every `owner -> port` entry and kill occupants.
///
/// Kill failures are logged and skipped. A probe failure stops the pass.
pub fn release_ports(
    table: &IndexMap<String, u16>,
    killer: &dyn PortKiller,
) -> Result<ReleaseReport, PortError> {
    let mut report = ReleaseReport::default();

    for (owner, &port) in table {
        if !is_port_occupied(port)? {
            crate::debug_event!("ports", "free", "{owner} ({port})");
            continue;
        }

        crate::log_event!("ports", "releasing", "{owner} ({port})");
        report.occupied.push(owner.clone());

        if let Err(e) = killer.kill(port) {
            tracing::warn!("[ports] {e}");
        }
    }

    Ok(report)
}
