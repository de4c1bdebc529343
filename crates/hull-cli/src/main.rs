//! hullsrv - command-line interface for the convex hull server

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use hull_core::{DataPath, HullConfig};
use hull_monitor::Transition;
use hull_server::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hullsrv")]
#[command(about = "Concurrent convex hull server", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the server until Ctrl+C
    Serve {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Address to bind, overriding the config file
        #[arg(long)]
        bind: Option<String>,

        /// Port to listen on, overriding the config file
        #[arg(short, long)]
        port: Option<u16>,

        /// Connection data path: proactor or reactor
        #[arg(long)]
        data_path: Option<DataPath>,
    },
    /// Validate a configuration file and print the effective settings
    Check {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Serve {
            config,
            bind,
            port,
            data_path,
        } => {
            let mut config = load_config(config.as_ref())?;
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(data_path) = data_path {
                config.server.data_path = data_path;
            }
            config.validate()?;
            serve(&config)
        }
        Commands::Check { config } => {
            let config = load_config(config.as_ref())?;
            config.validate()?;
            let rendered = toml::to_string_pretty(&config).context("rendering config")?;
            println!("config OK\n\n{}", rendered);
            Ok(())
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<HullConfig> {
    match path {
        Some(path) => HullConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(HullConfig::default()),
    }
}

fn serve(config: &HullConfig) -> anyhow::Result<()> {
    let server = Server::bind(config)?;
    println!(
        "Server running on port {}. Press Ctrl+C to exit.",
        server.local_addr().port()
    );

    let running = server.start(Box::new(|transition: Transition| println!("{}", transition)))?;

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("building signal runtime")?
        .block_on(tokio::signal::ctrl_c())
        .context("waiting for Ctrl+C")?;

    info!("interrupt received");
    running.shutdown()?;
    println!("Server stopped.");
    Ok(())
}
