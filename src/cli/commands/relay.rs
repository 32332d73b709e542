//! Relay command - websocket relay only.

use anyhow::Context;

use crate::config::Settings;
use crate::relay::Relay;

/// Run the relay until Ctrl-C.
pub async fn run(config: &Settings, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or(config.relay.port);
    let relay = Relay::bind((config.relay.host.as_str(), port))
        .await
        .context("Relay could not start")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    relay.shutdown();
    Ok(())
}
