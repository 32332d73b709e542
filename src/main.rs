use clap::Parser;
use devrelay::Settings;
use devrelay::cli::commands::{self, serve::ServeArgs};
use devrelay::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let config = config.unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        eprintln!("Using default configuration for now.");
        Settings::default()
    });

    devrelay::logging::init_with_config(&config.logging);

    let result = match cli.command {
        Commands::Init { force } => match std::env::current_dir() {
            Ok(dir) => commands::init::run_init(&dir, force),
            Err(e) => Err(e.into()),
        },
        Commands::Config => commands::init::run_config(&config),
        Commands::Serve {
            relay_port,
            no_relay,
            no_notify,
            no_hot_reload,
            no_watch,
            release_ports,
        } => {
            let args = ServeArgs {
                relay_port,
                relay: !no_relay,
                notify: !no_notify,
                hot_reload: !no_hot_reload,
                watch: !no_watch,
                release_ports,
            };
            commands::serve::run(args, config).await
        }
        Commands::Relay { port } => commands::relay::run(&config, port).await,
        Commands::Send { subject, target } => commands::send::run(&config, &subject, target).await,
        Commands::ReleasePorts => commands::ports::run(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
