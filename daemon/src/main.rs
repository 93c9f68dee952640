//! spigot daemon — entry point for running a faucet node.

use std::path::PathBuf;

use clap::Parser;
use spigot_node::{init_logging, FaucetConfig, PowServer, PowService};

#[derive(Parser)]
#[command(name = "spigot-daemon", about = "spigot proof-of-work faucet daemon")]
struct Cli {
    /// Port for websocket and metrics connections.
    #[arg(long, env = "SPIGOT_PORT")]
    port: Option<u16>,

    /// HMAC secret for recovery and claim tokens. Required outside of dev.
    #[arg(long, env = "SPIGOT_SECRET")]
    secret: Option<String>,

    /// Path for the persistent session/address mark store.
    #[arg(long, env = "SPIGOT_STORE_PATH")]
    store_path: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "SPIGOT_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "SPIGOT_LOG_FORMAT")]
    log_format: Option<String>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => FaucetConfig::from_toml_file(path)?,
        None => FaucetConfig::default(),
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(secret) = cli.secret {
        config.secret = secret;
    }
    if let Some(path) = cli.store_path {
        config.store.path = path;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }

    init_logging(config.log_format.parse()?, &config.log_level);
    if let Some(ref path) = cli.config {
        tracing::info!("loaded config from {}", path.display());
    }

    tracing::info!(
        "starting spigot faucet (port: {}, hasher: {}, difficulty: {})",
        config.port,
        config.pow.hasher,
        config.pow.difficulty,
    );

    let port = config.port;
    let service = PowService::new(config)?;
    service.spawn_sweeper();

    let server = PowServer::new(port, service.clone());
    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received — stopping faucet");
        }
    }

    service.shutdown()?;
    tracing::info!("spigot daemon exited cleanly");
    Ok(())
}
