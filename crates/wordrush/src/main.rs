//! wordrush server binary: CLI, logging, config resolution, and the serve
//! loop with graceful ctrl-c shutdown.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use wordrush_core::config::Config;
use wordrush_core::words::WordPool;

/// Real-time multiplayer typing-race server.
#[derive(Debug, Parser)]
#[command(name = "wordrush", version, about)]
struct Cli {
    /// TCP listening port (overrides the config file).
    #[arg(long)]
    port: Option<u16>,

    /// Word list file, one word per line.
    #[arg(long, default_value = "word_list.txt")]
    words: PathBuf,

    /// Optional JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("resolving configuration")?;
    if let Some(port) = cli.port {
        config.port = port;
    }

    let pool = Arc::new(
        WordPool::load(&cli.words)
            .with_context(|| format!("loading word list from {}", cli.words.display()))?,
    );

    info!(
        port = config.port,
        words = pool.len(),
        lobby_capacity = config.lobby_capacity,
        registry_capacity = config.registry_capacity,
        "starting wordrush server"
    );

    tokio::select! {
        result = wordrush_server::serve(Arc::new(config), pool) => {
            result.context("server terminated")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }
    Ok(())
}
