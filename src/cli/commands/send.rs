//! Send command - deliver one subject to a notify server.

use crate::config::Settings;
use crate::jobs::send_subject;

pub async fn run(config: &Settings, subject: &str, target: Option<String>) -> anyhow::Result<()> {
    let target = target.unwrap_or_else(|| {
        format!(
            "{}:{}",
            config.notify_server.address, config.notify_server.port
        )
    });

    send_subject(&target, subject).await?;
    crate::debug_event!("send", "sent", "{subject} -> {target}");
    Ok(())
}
