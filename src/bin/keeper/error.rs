//! Error types for the keeper binary.

use synth_keeper::{
    Network,
    error::{ChainError, PriceFeedError},
    registry::RegistryError,
};

use crate::config::ConfigError;

/// Main error type for the keeper.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Environment configuration error: {0}")]
    EnvConfig(#[from] envy::Error),

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Pool registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Price feed error: {0}")]
    PriceFeed(#[from] PriceFeedError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to initialize logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("Node is on chain {actual}, expected {expected}")]
    NetworkMismatch { expected: Network, actual: u64 },
}

pub type Result<T> = std::result::Result<T, Error>;
