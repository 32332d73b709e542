//! Release-ports command.

use crate::config::Settings;
use crate::ports::{ShellPortKiller, release_ports};

/// Free every port listed in `[ports]`.
pub fn run(config: &Settings) -> anyhow::Result<()> {
    if config.ports.is_empty() {
        println!("No ports configured in [ports]");
        return Ok(());
    }

    let report = release_ports(&config.ports, &ShellPortKiller)?;
    if report.occupied.is_empty() {
        println!("All {} ports are free", config.ports.len());
    } else {
        println!("Released: {}", report.occupied.join(", "));
    }
    Ok(())
}
