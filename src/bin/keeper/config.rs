//! Configuration for the keeper.
//!
//! Configuration comes from two sources:
//! - Environment variables (via .env file or shell): connection details, keys, keeper parameters
//! - CLI arguments: pools file and price feed strategy
//!
//! Both are validated eagerly into [`Settings`]; the keeper refuses to start on any invalid value.

use std::{path::PathBuf, time::Duration};

use alloy::signers::local::PrivateKeySigner;
use clap::{Parser, ValueEnum};
use fastnum::{UD128, decimal::Context};
use synth_keeper::{
    Network, UnknownNetwork,
    keeper::KeeperConfig,
    price::ReversedPairs,
    settle::DEFAULT_RECEIPT_TIMEOUT,
};
use url::Url;

const DEFAULT_PRICE_FEED_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment configuration.
#[derive(Debug, serde::Deserialize)]
pub struct EnvConfig {
    /// RPC URL for the node
    pub node_rpc_url: String,

    /// Private key for signing transactions
    pub private_key: String,

    /// Network name or chain ID the pools are deployed on
    pub network: String,

    /// Delay between polls in milliseconds
    pub frequency: u64,

    /// Price feed base URL
    pub price_feed_api: String,

    /// Maximum slippage as a fraction, e.g. 0.01
    pub max_slippage: String,

    /// Directory for the log file
    pub log_dir: String,

    /// Log filter directive (default: info)
    pub log_level: Option<String>,

    /// Price feed request timeout (default: 10s)
    pub price_feed_timeout_seconds: Option<u64>,

    /// Time to wait for settlement receipts (default: 120s)
    pub receipt_timeout_seconds: Option<u64>,

    /// Comma-separated pairs quoted in inverted form (default: USDCHF)
    pub reversed_pairs: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }
}

/// Price feed strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FeedKind {
    /// Websocket subscription with an in-memory price history, falling back to point queries
    Stream,
    /// On-demand history query per request
    Rest,
}

/// CLI arguments for the keeper.
#[derive(Debug, Parser)]
#[command(name = "keeper")]
#[command(about = "Validates and settles pending synthetic pool requests")]
pub struct CliConfig {
    /// Pools file listing the synthetics to keep
    #[arg(long, default_value = "config/pools.json")]
    pub pools: PathBuf,

    /// Price feed strategy
    #[arg(long, value_enum, default_value_t = FeedKind::Rest)]
    pub feed: FeedKind,
}

/// Validated keeper configuration.
#[derive(Debug)]
pub struct Settings {
    pub node_url: Url,
    pub signer: PrivateKeySigner,
    pub network: Network,
    pub keeper: KeeperConfig,
    pub price_feed_api: Url,
    pub price_feed_timeout: Duration,
    pub reversed_pairs: ReversedPairs,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub pools: PathBuf,
    pub feed: FeedKind,
}

impl Settings {
    pub fn new(env: EnvConfig, cli: CliConfig) -> Result<Self, ConfigError> {
        let node_url = parse_url("NODE_RPC_URL", &env.node_rpc_url)?;
        let price_feed_api = parse_url("PRICE_FEED_API", &env.price_feed_api)?;

        let signer: PrivateKeySigner = env
            .private_key
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidPrivateKey)?;

        let network: Network = env.network.parse()?;

        if env.frequency == 0 {
            return Err(ConfigError::ZeroFrequency);
        }

        let max_slippage = UD128::from_str(env.max_slippage.trim(), Context::default())
            .map_err(|_| ConfigError::InvalidSlippage(env.max_slippage.clone()))?;
        if max_slippage >= UD128::ONE {
            return Err(ConfigError::InvalidSlippage(env.max_slippage.clone()));
        }

        if env.log_dir.trim().is_empty() {
            return Err(ConfigError::EmptyLogDir);
        }

        let reversed_pairs = match &env.reversed_pairs {
            Some(pairs) => ReversedPairs::new(
                pairs
                    .split(',')
                    .map(str::trim)
                    .filter(|pair| !pair.is_empty()),
            ),
            None => ReversedPairs::default(),
        };

        Ok(Self {
            node_url,
            signer,
            network,
            keeper: KeeperConfig {
                frequency: Duration::from_millis(env.frequency),
                max_slippage,
                receipt_timeout: env
                    .receipt_timeout_seconds
                    .map(Duration::from_secs)
                    .unwrap_or(DEFAULT_RECEIPT_TIMEOUT),
            },
            price_feed_api,
            price_feed_timeout: env
                .price_feed_timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_PRICE_FEED_TIMEOUT),
            reversed_pairs,
            log_dir: PathBuf::from(env.log_dir),
            log_level: env.log_level.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            pools: cli.pools,
            feed: cli.feed,
        })
    }
}

fn parse_url(key: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value.trim()).map_err(|source| ConfigError::InvalidUrl { key, source })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid URL for {key}: {source}")]
    InvalidUrl {
        key: &'static str,
        source: url::ParseError,
    },

    #[error("Invalid private key")]
    InvalidPrivateKey,

    #[error("Invalid network: {0}")]
    InvalidNetwork(#[from] UnknownNetwork),

    #[error("FREQUENCY must be greater than zero")]
    ZeroFrequency,

    #[error("MAX_SLIPPAGE must be a fraction in [0, 1), got {0}")]
    InvalidSlippage(String),

    #[error("LOG_DIR cannot be empty")]
    EmptyLogDir,
}

#[cfg(test)]
mod tests {
    use fastnum::udec128;

    use super::*;

    // Well-known Anvil development key
    const PRIVATE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn env() -> EnvConfig {
        EnvConfig {
            node_rpc_url: "http://localhost:8545".to_string(),
            private_key: PRIVATE_KEY.to_string(),
            network: "kovan".to_string(),
            frequency: 5000,
            price_feed_api: "https://prices.example.com/v1".to_string(),
            max_slippage: "0.01".to_string(),
            log_dir: "logs".to_string(),
            log_level: None,
            price_feed_timeout_seconds: None,
            receipt_timeout_seconds: Some(60),
            reversed_pairs: None,
        }
    }

    fn cli() -> CliConfig {
        CliConfig {
            pools: PathBuf::from("config/pools.json"),
            feed: FeedKind::Rest,
        }
    }

    #[test]
    fn test_settings_from_env() {
        let settings = Settings::new(env(), cli()).unwrap();

        assert_eq!(settings.network, Network::kovan());
        assert_eq!(settings.keeper.frequency, Duration::from_millis(5000));
        assert_eq!(settings.keeper.max_slippage, udec128!(0.01));
        assert_eq!(settings.keeper.receipt_timeout, Duration::from_secs(60));
        assert_eq!(settings.price_feed_timeout, DEFAULT_PRICE_FEED_TIMEOUT);
        assert_eq!(settings.log_level, "info");
        assert!(settings.reversed_pairs.contains("USDCHF"));
        assert_eq!(
            settings.signer.address().to_string(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn test_reversed_pairs_override() {
        let settings = Settings::new(
            EnvConfig {
                reversed_pairs: Some("USDJPY, USDCHF,".to_string()),
                ..env()
            },
            cli(),
        )
        .unwrap();

        assert!(settings.reversed_pairs.contains("USDJPY"));
        assert!(settings.reversed_pairs.contains("USDCHF"));
        assert!(!settings.reversed_pairs.contains(""));
    }

    #[test]
    fn test_invalid_slippage() {
        for slippage in ["1", "1.5", "-0.1", "one percent"] {
            let result = Settings::new(
                EnvConfig {
                    max_slippage: slippage.to_string(),
                    ..env()
                },
                cli(),
            );
            assert!(
                matches!(result, Err(ConfigError::InvalidSlippage(_))),
                "{slippage} accepted"
            );
        }
    }

    #[test]
    fn test_zero_frequency() {
        assert!(matches!(
            Settings::new(EnvConfig { frequency: 0, ..env() }, cli()),
            Err(ConfigError::ZeroFrequency)
        ));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Settings::new(
                EnvConfig {
                    node_rpc_url: "not a url".to_string(),
                    ..env()
                },
                cli()
            ),
            Err(ConfigError::InvalidUrl { key: "NODE_RPC_URL", .. })
        ));
        assert!(matches!(
            Settings::new(
                EnvConfig {
                    private_key: "0x1234".to_string(),
                    ..env()
                },
                cli()
            ),
            Err(ConfigError::InvalidPrivateKey)
        ));
        assert!(matches!(
            Settings::new(
                EnvConfig {
                    network: "atlantis".to_string(),
                    ..env()
                },
                cli()
            ),
            Err(ConfigError::InvalidNetwork(_))
        ));
    }

    #[test]
    fn test_cli_defaults() {
        let cli = CliConfig::parse_from(["keeper"]);
        assert_eq!(cli.pools, PathBuf::from("config/pools.json"));
        assert_eq!(cli.feed, FeedKind::Rest);

        let cli = CliConfig::parse_from(["keeper", "--feed", "stream", "--pools", "pools.json"]);
        assert_eq!(cli.feed, FeedKind::Stream);
        assert_eq!(cli.pools, PathBuf::from("pools.json"));
    }
}
