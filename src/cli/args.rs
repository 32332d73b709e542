//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Hot-reload relay and rebuild trigger for front-end dev servers
#[derive(Parser, Debug)]
#[command(
    name = "devrelay",
    version = env!("CARGO_PKG_VERSION"),
    about = "Hot-reload relay and rebuild trigger for front-end dev servers",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create .devrelay/settings.toml with defaults
    Init {
        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Display active settings
    Config,

    /// Run the relay, notify server and watchers until Ctrl-C
    Serve {
        /// Relay port (overrides config)
        #[arg(long, value_name = "PORT")]
        relay_port: Option<u16>,

        /// Do not start the websocket relay
        #[arg(long)]
        no_relay: bool,

        /// Do not start the UDP notify server
        #[arg(long)]
        no_notify: bool,

        /// Do not push changed files to browsers
        #[arg(long)]
        no_hot_reload: bool,

        /// Do not run watch task rules
        #[arg(long)]
        no_watch: bool,

        /// Free the ports in [ports] before starting
        #[arg(long)]
        release_ports: bool,
    },

    /// Run only the websocket relay
    Relay {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send a subject to a running notify server
    Send {
        /// Subject string, usually a changed file path
        subject: String,

        /// Notify server address (defaults to the configured one)
        #[arg(long, value_name = "ADDR")]
        target: Option<String>,
    },

    /// Kill processes still holding the ports in [ports]
    ReleasePorts,
}
