//! Synthetic-asset pool keeper.
//!
//! # Overview
//!
//! Off-chain validator for synthetic-asset pools: every tick it lists the
//! pending mint, redeem and exchange requests of each configured pool,
//! checks them against the historical price at request time within a
//! slippage tolerance, verifies the sender's token balance and allowance,
//! and submits an approve or reject transaction back to the pool.
//!
//! Use [`registry::load_pools`] to resolve pool descriptions once at startup,
//! then [`keeper::Keeper`] to run the polling loop.
//!
//! Request evaluation is split into a pure decision core ([`validate`]) and
//! the I/O around it: [`price`] for quotes, [`ledger`] for ERC-20 reads,
//! [`source`] for listing pending requests and [`settle`] for submission.
//!
//! # Limitations/follow-ups
//!
//! * Transactions are submitted with the provider's default gas pricing;
//!   there is no gas price escalation for stuck transactions.
//!
//! * A settlement whose receipt did not arrive in time is awaited on later
//!   ticks and its request is skipped meanwhile. A transaction that never gets
//!   included is waited on indefinitely, since nothing replaces or cancels it.
//!
//! # Testing
//!
//! [`testing`] module provides in-memory chain and price collaborators, so the
//! whole loop can be exercised without a node or a price feed.

pub mod abi;
pub mod chain;
pub mod error;
pub mod keeper;
pub mod ledger;
pub mod num;
pub mod price;
pub mod registry;
pub mod settle;
pub mod source;
pub mod testing;
pub mod types;
pub mod validate;

use std::{fmt, str::FromStr};

#[derive(Clone, Debug, PartialEq, Eq)]
/// Chain the pools are deployed on.
pub struct Network {
    chain_id: u64,
    name: String,
}

impl Network {
    pub fn mainnet() -> Self {
        Self::custom(1, "mainnet")
    }

    pub fn kovan() -> Self {
        Self::custom(42, "kovan")
    }

    pub fn polygon() -> Self {
        Self::custom(137, "polygon")
    }

    pub fn custom(chain_id: u64, name: impl Into<String>) -> Self {
        Self {
            chain_id,
            name: name.into(),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.chain_id)
    }
}

/// Unrecognized network identifier.
#[derive(Debug, thiserror::Error)]
#[error("unknown network: {0}")]
pub struct UnknownNetwork(String);

impl FromStr for Network {
    type Err = UnknownNetwork;

    /// Accepts a well-known network name or a numeric chain ID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "1" => Ok(Self::mainnet()),
            "kovan" | "42" => Ok(Self::kovan()),
            "polygon" | "137" => Ok(Self::polygon()),
            other => other
                .parse::<u64>()
                .map(|chain_id| Self::custom(chain_id, format!("chain-{chain_id}")))
                .map_err(|_| UnknownNetwork(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_from_name_or_id() {
        assert_eq!("kovan".parse::<Network>().unwrap(), Network::kovan());
        assert_eq!("Mainnet".parse::<Network>().unwrap().chain_id(), 1);
        assert_eq!("1337".parse::<Network>().unwrap().chain_id(), 1337);
        assert!("goerlish".parse::<Network>().is_err());
    }
}
