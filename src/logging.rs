//! Timestamped logging for the relay, queue and watchers.
//!
//! Compact `HH:MM:SS.mmm` lines with per-module level configuration.
//! `RUST_LOG` overrides the config when set.
//!
//! # Configuration
//!
//! ```toml
//! [logging]
//! default = "info"
//!
//! [logging.modules]
//! "devrelay::relay" = "debug"
//! ```
//!
//! # Environment Variable
//!
//! ```bash
//! RUST_LOG=debug devrelay serve
//! RUST_LOG=devrelay::jobs=trace devrelay serve
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Build the filter directive string from config.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.default.clone();
    for (module, level) in &config.modules {
        filter_str.push_str(&format!(",{module}={level}"));
    }
    filter_str
}

/// Initialize logging with configuration.
///
/// Only the first call takes effect. Levels from quietest to loudest:
/// `error`, `warn`, `info` (default), `debug`, `trace`.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Initialize logging with `LoggingConfig::default()`.
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Log an event with component context.
///
/// # Examples
/// ```ignore
/// log_event!("relay", "client connected", "{count}");
/// log_event!("jobs", "batch fired");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Debug-only event logging.
///
/// # Examples
/// ```ignore
/// debug_event!("notify", "unmatched", "{subject}");
/// ```
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives_include_module_overrides() {
        let mut config = LoggingConfig::default();
        config
            .modules
            .insert("devrelay::relay".to_string(), "debug".to_string());

        let directives = filter_directives(&config);
        assert_eq!(directives, "info,devrelay::relay=debug");
    }
}
