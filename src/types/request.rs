use alloy::primitives::{Address, U256};

use crate::abi::pool::ISynthereumPool;

use super::*;

/// Request to mint synthetic tokens against deposited collateral.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MintRequest {
    pub id: RequestId,
    pub timestamp: Timestamp,
    pub sender: Address,
    /// In collateral token decimals.
    pub collateral_amount: U256,
    /// In synthetic token decimals.
    pub num_tokens: U256,
}

/// Request to burn synthetic tokens and withdraw collateral.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RedeemRequest {
    pub id: RequestId,
    pub timestamp: Timestamp,
    pub sender: Address,
    /// In collateral token decimals.
    pub collateral_amount: U256,
    /// In synthetic token decimals.
    pub num_tokens: U256,
}

/// Request to swap synthetic tokens of the source pool into synthetic
/// tokens of the destination pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub id: RequestId,
    pub timestamp: Timestamp,
    pub sender: Address,
    pub dest_pool: Address,
    /// In source synthetic token decimals.
    pub num_tokens: U256,
    /// Collateral moved between the pools, in collateral token decimals.
    pub collateral_amount: U256,
    /// In destination synthetic token decimals.
    pub dest_num_tokens: U256,
}

/// Pending pool request observed on chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    Mint(MintRequest),
    Redeem(RedeemRequest),
    Exchange(ExchangeRequest),
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Mint(_) => RequestKind::Mint,
            Request::Redeem(_) => RequestKind::Redeem,
            Request::Exchange(_) => RequestKind::Exchange,
        }
    }

    pub fn id(&self) -> RequestId {
        match self {
            Request::Mint(r) => r.id,
            Request::Redeem(r) => r.id,
            Request::Exchange(r) => r.id,
        }
    }

    /// Creation time; the price is looked up at this instant.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Request::Mint(r) => r.timestamp,
            Request::Redeem(r) => r.timestamp,
            Request::Exchange(r) => r.timestamp,
        }
    }

    pub fn sender(&self) -> Address {
        match self {
            Request::Mint(r) => r.sender,
            Request::Redeem(r) => r.sender,
            Request::Exchange(r) => r.sender,
        }
    }
}

impl From<ISynthereumPool::MintRequest> for MintRequest {
    fn from(value: ISynthereumPool::MintRequest) -> Self {
        Self {
            id: value.mintID,
            timestamp: value.timestamp.saturating_to(),
            sender: value.sender,
            collateral_amount: value.collateralAmount.rawValue,
            num_tokens: value.numTokens.rawValue,
        }
    }
}

impl From<ISynthereumPool::RedeemRequest> for RedeemRequest {
    fn from(value: ISynthereumPool::RedeemRequest) -> Self {
        Self {
            id: value.redeemID,
            timestamp: value.timestamp.saturating_to(),
            sender: value.sender,
            collateral_amount: value.collateralAmount.rawValue,
            num_tokens: value.numTokens.rawValue,
        }
    }
}

impl From<ISynthereumPool::ExchangeRequest> for ExchangeRequest {
    fn from(value: ISynthereumPool::ExchangeRequest) -> Self {
        Self {
            id: value.exchangeID,
            timestamp: value.timestamp.saturating_to(),
            sender: value.sender,
            dest_pool: value.destTIC,
            num_tokens: value.numTokens.rawValue,
            collateral_amount: value.collateralAmount.rawValue,
            dest_num_tokens: value.destNumTokens.rawValue,
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, b256};

    use super::*;

    #[test]
    fn test_exchange_request_from_abi() {
        let raw = ISynthereumPool::ExchangeRequest {
            exchangeID: b256!("0x00000000000000000000000000000000000000000000000000000000000000aa"),
            timestamp: U256::from(1_600_000_000u64),
            sender: address!("0x1111111111111111111111111111111111111111"),
            destTIC: address!("0x2222222222222222222222222222222222222222"),
            numTokens: ISynthereumPool::FixedPoint { rawValue: U256::from(10u64) },
            collateralAmount: ISynthereumPool::FixedPoint { rawValue: U256::from(12u64) },
            destNumTokens: ISynthereumPool::FixedPoint { rawValue: U256::from(9u64) },
        };

        let request = Request::Exchange(raw.into());
        assert_eq!(request.kind(), RequestKind::Exchange);
        assert_eq!(request.timestamp(), 1_600_000_000);
        assert_eq!(request.sender(), address!("0x1111111111111111111111111111111111111111"));
        let Request::Exchange(exchange) = request else {
            unreachable!()
        };
        assert_eq!(exchange.dest_pool, address!("0x2222222222222222222222222222222222222222"));
        assert_eq!(exchange.num_tokens, U256::from(10u64));
        assert_eq!(exchange.collateral_amount, U256::from(12u64));
        assert_eq!(exchange.dest_num_tokens, U256::from(9u64));
    }

    #[test]
    fn test_timestamp_saturates() {
        let raw = ISynthereumPool::MintRequest {
            mintID: RequestId::ZERO,
            timestamp: U256::MAX,
            sender: Address::ZERO,
            collateralAmount: ISynthereumPool::FixedPoint { rawValue: U256::ZERO },
            numTokens: ISynthereumPool::FixedPoint { rawValue: U256::ZERO },
        };
        assert_eq!(MintRequest::from(raw).timestamp, u64::MAX);
    }
}
