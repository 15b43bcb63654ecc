//! Pool descriptions loaded once at startup.
//!
//! The pools file lists the synthetics to keep, each with its price feed pair and optionally its
//! pool address. Pools without an address are resolved through the factory's symbol registry.
//! Token addresses and decimals are always read from chain.

use std::{collections::HashSet, fs, path::Path};

use alloy::primitives::Address;
use alloy_sol_types::SolCall;
use futures::future::try_join_all;
use serde::Deserialize;
use tracing::info;

use crate::{
    abi::{factory::ISynthereumFactory, pool::ISynthereumPool},
    chain::{self, ChainClient},
    error::ChainError,
    ledger::TokenLedger,
    types::{Pool, Token},
};

/// Contents of the pools file.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct PoolsFile {
    /// Symbol registry used for synthetics listed without a pool address.
    #[serde(default)]
    pub factory_address: Option<Address>,
    pub synthetics: Vec<SyntheticEntry>,
}

/// One synthetic to keep.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SyntheticEntry {
    pub symbol: String,
    pub price_feed: String,
    #[serde(default)]
    pub pool_address: Option<Address>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read pools file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed pools file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0} has no pool address and no factory is configured")]
    MissingPool(String),

    #[error("{0} is not registered in the factory")]
    Unregistered(String),

    #[error("{0} is listed more than once")]
    Duplicate(String),

    #[error("failed to load {symbol}: {source}")]
    Chain {
        symbol: String,
        #[source]
        source: ChainError,
    },
}

impl PoolsFile {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let file: Self = serde_json::from_str(json)?;
        let mut seen = HashSet::new();
        for entry in &file.synthetics {
            if !seen.insert(entry.symbol.as_str()) {
                return Err(RegistryError::Duplicate(entry.symbol.clone()));
            }
        }
        Ok(file)
    }

    /// Distinct price feed pairs, in listing order.
    pub fn price_feeds(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.synthetics
            .iter()
            .filter(|entry| seen.insert(entry.price_feed.as_str()))
            .map(|entry| entry.price_feed.clone())
            .collect()
    }
}

/// Resolves every listed synthetic into a [`Pool`].
pub async fn load_pools<C: ChainClient>(
    client: &C,
    file: &PoolsFile,
) -> Result<Vec<Pool>, RegistryError> {
    let pools = try_join_all(
        file.synthetics
            .iter()
            .map(|entry| load_pool(client, file.factory_address, entry)),
    )
    .await?;

    let mut seen = HashSet::new();
    for pool in &pools {
        if !seen.insert(pool.address()) {
            return Err(RegistryError::Duplicate(pool.symbol().to_owned()));
        }
        info!(
            symbol = pool.symbol(),
            pair = pool.price_feed(),
            pool = %pool.address(),
            collateral = %pool.collateral().address,
            collateral_decimals = pool.collateral().decimals,
            synthetic = %pool.synthetic().address,
            synthetic_decimals = pool.synthetic().decimals,
            "loaded pool"
        );
    }
    Ok(pools)
}

async fn load_pool<C: ChainClient>(
    client: &C,
    factory: Option<Address>,
    entry: &SyntheticEntry,
) -> Result<Pool, RegistryError> {
    let chain_err = |source| RegistryError::Chain {
        symbol: entry.symbol.clone(),
        source,
    };

    let address = match (entry.pool_address, factory) {
        (Some(address), _) => address,
        (None, Some(factory)) => {
            let address = resolve_symbol(client, factory, &entry.symbol)
                .await
                .map_err(chain_err)?;
            if address.is_zero() {
                return Err(RegistryError::Unregistered(entry.symbol.clone()));
            }
            address
        }
        (None, None) => return Err(RegistryError::MissingPool(entry.symbol.clone())),
    };

    let (collateral, synthetic) = futures::try_join!(
        pool_token(client, address, ISynthereumPool::collateralTokenCall {}),
        pool_token(client, address, ISynthereumPool::syntheticTokenCall {}),
    )
    .map_err(chain_err)?;

    Ok(Pool::new(
        entry.symbol.clone(),
        entry.price_feed.clone(),
        address,
        collateral,
        synthetic,
    ))
}

async fn resolve_symbol<C: ChainClient>(
    client: &C,
    factory: Address,
    symbol: &str,
) -> Result<Address, ChainError> {
    let calldata = ISynthereumFactory::symbolToTICCall {
        symbol: symbol.to_owned(),
    }
    .abi_encode();
    let data = client.call_view(chain::call(factory, calldata)).await?;
    Ok(ISynthereumFactory::symbolToTICCall::abi_decode_returns(&data)?)
}

/// Reads a token address getter of the pool, then the token's decimals.
async fn pool_token<C, Call>(client: &C, pool: Address, call: Call) -> Result<Token, ChainError>
where
    C: ChainClient,
    Call: SolCall<Return = Address>,
{
    let data = client
        .call_view(chain::call(pool, call.abi_encode()))
        .await?;
    let address = Call::abi_decode_returns(&data)?;
    let decimals = TokenLedger::new(client).decimals(address).await?;
    Ok(Token::new(address, decimals))
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;

    use super::*;
    use crate::testing::{MockChain, PoolBuilder};

    const FACTORY: Address = address!("0x00000000000000000000000000000000000fac70");

    #[test]
    fn test_parse_pools_file() {
        let file = PoolsFile::from_json(
            r#"{
                "factory_address": "0x00000000000000000000000000000000000fac70",
                "synthetics": [
                    { "symbol": "jEUR", "price_feed": "EURUSD" },
                    { "symbol": "jCHF", "price_feed": "USDCHF", "pool_address": "0x00000000000000000000000000000000000a0003" },
                    { "symbol": "jEUR2", "price_feed": "EURUSD" }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(file.factory_address, Some(FACTORY));
        assert_eq!(file.synthetics.len(), 3);
        assert_eq!(file.synthetics[0].pool_address, None);
        assert_eq!(
            file.synthetics[1].pool_address,
            Some(PoolBuilder::jchf().build().address())
        );
        assert_eq!(file.price_feeds(), vec!["EURUSD", "USDCHF"]);
    }

    #[test]
    fn test_duplicate_symbol_is_rejected() {
        let err = PoolsFile::from_json(
            r#"{"synthetics": [
                { "symbol": "jEUR", "price_feed": "EURUSD" },
                { "symbol": "jEUR", "price_feed": "EURUSD" }
            ]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(symbol) if symbol == "jEUR"));
    }

    #[tokio::test]
    async fn test_load_pools_from_address_and_factory() {
        let jeur = PoolBuilder::jeur().build();
        let jkrw = PoolBuilder::jgbp()
            .symbol("jKRW")
            .price_feed("USDKRW")
            .synthetic_decimals(8)
            .build();
        let chain = MockChain::new();
        chain.add_pool(&jeur);
        chain.add_pool(&jkrw);
        chain.register_symbol(FACTORY, "jKRW", jkrw.address());

        let file = PoolsFile {
            factory_address: Some(FACTORY),
            synthetics: vec![
                SyntheticEntry {
                    symbol: "jEUR".into(),
                    price_feed: "EURUSD".into(),
                    pool_address: Some(jeur.address()),
                },
                SyntheticEntry {
                    symbol: "jKRW".into(),
                    price_feed: "USDKRW".into(),
                    pool_address: None,
                },
            ],
        };

        let pools = load_pools(&chain, &file).await.unwrap();
        assert_eq!(pools, vec![jeur, jkrw]);
    }

    #[tokio::test]
    async fn test_unregistered_symbol() {
        let chain = MockChain::new();
        let file = PoolsFile {
            factory_address: Some(FACTORY),
            synthetics: vec![SyntheticEntry {
                symbol: "jXYZ".into(),
                price_feed: "XYZUSD".into(),
                pool_address: None,
            }],
        };

        assert!(matches!(
            load_pools(&chain, &file).await,
            Err(RegistryError::Unregistered(symbol)) if symbol == "jXYZ"
        ));
    }

    #[tokio::test]
    async fn test_missing_pool_without_factory() {
        let chain = MockChain::new();
        let file = PoolsFile {
            factory_address: None,
            synthetics: vec![SyntheticEntry {
                symbol: "jEUR".into(),
                price_feed: "EURUSD".into(),
                pool_address: None,
            }],
        };

        assert!(matches!(
            load_pools(&chain, &file).await,
            Err(RegistryError::MissingPool(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_pool() {
        let jeur = PoolBuilder::jeur().build();
        let chain = MockChain::new();
        chain.add_pool(&jeur);
        chain.fail_views(jeur.address(), crate::testing::Fault::Transport);
        let file = PoolsFile {
            factory_address: None,
            synthetics: vec![SyntheticEntry {
                symbol: "jEUR".into(),
                price_feed: "EURUSD".into(),
                pool_address: Some(jeur.address()),
            }],
        };

        assert!(matches!(
            load_pools(&chain, &file).await,
            Err(RegistryError::Chain { symbol, .. }) if symbol == "jEUR"
        ));
    }
}
