//! dSpace Daemon - background controllers for mounts, bindings and yield policies
//!
//! The daemon provides:
//! - Mount graph discovery over the seeded store
//! - The sync controller enforcing attribute bindings
//! - The policy controller moving active mounts between parents

use clap::Parser;
use dspace_daemon::{DaemonConfig, DaemonError, DaemonResult, Server};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// dSpace Daemon CLI
#[derive(Parser)]
#[command(name = "dspaced")]
#[command(about = "dSpace Daemon - mount, sync and yield policy controllers", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "DSPACE_CONFIG")]
    config: Option<String>,

    /// JSON file of documents to load at startup
    #[arg(short, long, env = "DSPACE_SEED")]
    seed: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "DSPACE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "DSPACE_LOG_JSON")]
    json: bool,

    /// Print the discovered mount graph and exit
    #[arg(long)]
    print_graph: bool,
}

#[tokio::main]
async fn main() -> DaemonResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = DaemonConfig::load(cli.config.as_deref())
        .map_err(|e| DaemonError::Config(e.to_string()))?;

    // Override with CLI args
    if let Some(seed) = cli.seed {
        config.store.seed_path = Some(seed);
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;

    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        seed = ?config.store.seed_path,
        discovery = config.discovery.enabled,
        "Starting dspaced"
    );

    let server = Server::new(config);

    if cli.print_graph {
        server.prepare().await?;
        let graph = server.graph();
        print!("{}", graph.read().await);
        return Ok(());
    }

    server.run().await
}
