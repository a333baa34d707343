//--------------------------------------------------------------------------------------------------
// MODULE OVERVIEW
//--------------------------------------------------------------------------------------------------
// This is the main entry point for the exchange server.
// It loads the configuration, seeds the stock table, starts the price evolver and serves the API
// until Ctrl+C.
//--------------------------------------------------------------------------------------------------

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};

use mini_exchange::{Api, AppState, Config, ListingService, PriceEvolver, PriceStore};

/// Command line arguments for the exchange server
#[derive(Parser, Debug)]
#[command(author, version, about = "Stock exchange simulator")]
struct Args {
    /// Port to listen on, overrides the port of EXCHANGE_ADDR
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error), overrides EXCHANGE_LOG_LEVEL
    #[arg(short, long)]
    log_level: Option<Level>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = Config::try_from_env().context("invalid configuration")?;
    if let Some(port) = args.port {
        config.addr = SocketAddr::new(config.addr.ip(), port);
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    info!("Loaded configuration: {:?}", config);
    info!("Starting stock exchange on {}", config.addr);

    let store = PriceStore::new();
    if config.seed_stocks {
        let seeded = ListingService::new(store.clone()).list_seed_stocks(&mut rand::thread_rng());
        info!("Seeded stocks: {:?}", seeded.listed);
    }

    let shutdown = CancellationToken::new();

    let evolver = PriceEvolver::new(store.clone(), config.evolver());
    let evolver_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(err) = evolver.run(shutdown.child_token()).await {
                error!("Price evolver failed, shutting down: {}", err);
                shutdown.cancel();
            }
        }
    });

    let api = Api::new(config.addr, AppState::new(store, &config, shutdown.clone()));
    let server_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { api.serve(shutdown).await }
    });

    tokio::select! {
        result = signal::ctrl_c() => {
            result.context("failed to listen for Ctrl+C")?;
            info!("Shutdown signal received, stopping...");
        }
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();

    server_task.await?.context("API server error")?;
    evolver_task.await?;
    info!("Stock exchange stopped");
    Ok(())
}
