mod decision;
mod request;

use std::fmt;

use alloy::primitives::{Address, B256};

pub use decision::{Decision, RejectReason};
pub use request::{ExchangeRequest, MintRequest, RedeemRequest, Request};

use crate::num;

/// Pool-assigned request identifier.
/// Unique only within a particular pool and request kind.
pub type RequestId = B256;

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

/// Kind of the pending pool request.
///
/// * [`RequestKind::Mint`] deposits collateral to create synthetic tokens.
/// * [`RequestKind::Redeem`] burns synthetic tokens to withdraw collateral.
/// * [`RequestKind::Exchange`] converts synthetic tokens of one pool directly
///   into synthetic tokens of another pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestKind {
    Mint,
    Redeem,
    Exchange,
}

impl RequestKind {
    pub const ALL: [RequestKind; 3] = [RequestKind::Mint, RequestKind::Redeem, RequestKind::Exchange];
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequestKind::Mint => "mint",
            RequestKind::Redeem => "redeem",
            RequestKind::Exchange => "exchange",
        })
    }
}

/// ERC-20 token along with its precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Token {
    pub address: Address,
    pub decimals: u8,
}

impl Token {
    pub fn new(address: Address, decimals: u8) -> Self {
        Self { address, decimals }
    }

    pub fn converter(&self) -> num::Converter {
        num::Converter::new(self.decimals)
    }
}

/// Static description of one tradable synthetic asset.
///
/// Loaded once at startup and never changed afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pool {
    symbol: String,
    price_feed: String,
    address: Address,
    collateral: Token,
    synthetic: Token,
}

impl Pool {
    pub fn new(
        symbol: impl Into<String>,
        price_feed: impl Into<String>,
        address: Address,
        collateral: Token,
        synthetic: Token,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price_feed: price_feed.into(),
            address,
            collateral,
            synthetic,
        }
    }

    /// Synthetic token symbol, e.g. `jEUR`.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Price feed pair identifier, e.g. `EURUSD`.
    pub fn price_feed(&self) -> &str {
        &self.price_feed
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn collateral(&self) -> Token {
        self.collateral
    }

    pub fn synthetic(&self) -> Token {
        self.synthetic
    }
}
