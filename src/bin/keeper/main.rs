//! Synthetic pool keeper.
//!
//! This binary polls the configured pools for pending mint, redeem and exchange requests,
//! validates them against historical prices and settles them on chain.

mod config;
mod error;

use std::{
    fs::{self, OpenOptions},
    process::exit,
    sync::{Arc, Mutex},
};

use alloy::network::EthereumWallet;
use clap::Parser;
use synth_keeper::{
    chain::{ChainClient, RpcChainClient},
    keeper::Keeper,
    price::{FeedStrategy, PriceCache, PriceOracle, RestFeed, StreamingFeed},
    registry::{PoolsFile, load_pools},
};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use config::{CliConfig, EnvConfig, FeedKind, Settings};
use error::{Error, Result};

const LOG_FILE: &str = "keeper.log";

#[tokio::main]
async fn main() {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Failed to load .env file: {}", e);
    }

    let env_config = match EnvConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to parse environment configuration: {}", e);
            exit(1);
        }
    };

    let cli_config = CliConfig::parse();

    let settings = match Settings::new(env_config, cli_config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            exit(1);
        }
    };

    if let Err(e) = init_logging(&settings) {
        eprintln!("{}", e);
        exit(1);
    }

    if let Err(e) = run(settings).await {
        error!(?e, "Keeper encountered an error, shutting down");
        exit(1);
    }
}

/// Logs to stdout and to `keeper.log` under the log directory.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(settings: &Settings) -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", &settings.log_level);
        }
    }

    fs::create_dir_all(&settings.log_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(settings.log_dir.join(LOG_FILE))?;

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()?;
    Ok(())
}

async fn run(settings: Settings) -> Result<()> {
    let client = RpcChainClient::new(
        settings.node_url.clone(),
        EthereumWallet::new(settings.signer.clone()),
    );

    let chain_id = client.chain_id().await?;
    if chain_id != settings.network.chain_id() {
        return Err(Error::NetworkMismatch {
            expected: settings.network,
            actual: chain_id,
        });
    }
    info!(network = %settings.network, sender = %client.sender(), "connected to node");

    let pools_file = PoolsFile::from_path(&settings.pools)?;
    let pools = load_pools(&client, &pools_file).await?;

    let rest = RestFeed::new(&settings.price_feed_api, settings.price_feed_timeout)?;
    let oracle = match settings.feed {
        FeedKind::Stream => PriceOracle::new(
            FeedStrategy::Streaming(StreamingFeed::start(
                &settings.price_feed_api,
                &pools_file.price_feeds(),
                Arc::new(PriceCache::new()),
            )?),
            settings.reversed_pairs.clone(),
        )
        .with_fallback(rest),
        FeedKind::Rest => PriceOracle::new(FeedStrategy::Rest(rest), settings.reversed_pairs.clone()),
    };

    let keeper = Keeper::new(client, oracle, pools, settings.keeper);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(signal) => info!(signal, "Shutdown requested, finishing current poll"),
            Err(e) => warn!(%e, "Failed to listen for shutdown signals, stopping"),
        }
        let _ = shutdown_tx.send(true);
    });

    keeper.run(shutdown_rx).await;
    keeper.prices().shutdown();
    Ok(())
}

async fn shutdown_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => Ok("SIGTERM"),
            _ = sigint.recv() => Ok("SIGINT"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("Ctrl+C")
    }
}
