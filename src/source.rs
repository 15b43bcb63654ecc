//! Pending request listing and settlement calls per pool and request kind.

use alloy::{primitives::Address, rpc::types::TransactionRequest};
use alloy_sol_types::SolCall;

use crate::{
    abi::pool::ISynthereumPool,
    chain::{self, ChainClient},
    error::ChainError,
    types::{Decision, Pool, Request, RequestId, RequestKind},
};

/// Pool operations of one request kind, resolved once per pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestOps {
    Mint(Address),
    Redeem(Address),
    Exchange(Address),
}

impl RequestOps {
    pub fn new(pool: &Pool, kind: RequestKind) -> Self {
        let address = pool.address();
        match kind {
            RequestKind::Mint => RequestOps::Mint(address),
            RequestKind::Redeem => RequestOps::Redeem(address),
            RequestKind::Exchange => RequestOps::Exchange(address),
        }
    }

    /// Operations for every request kind of the pool.
    pub fn all(pool: &Pool) -> [RequestOps; 3] {
        RequestKind::ALL.map(|kind| Self::new(pool, kind))
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            RequestOps::Mint(_) => RequestKind::Mint,
            RequestOps::Redeem(_) => RequestKind::Redeem,
            RequestOps::Exchange(_) => RequestKind::Exchange,
        }
    }

    pub fn pool(&self) -> Address {
        match self {
            RequestOps::Mint(pool) | RequestOps::Redeem(pool) | RequestOps::Exchange(pool) => {
                *pool
            }
        }
    }

    /// View call listing pending requests.
    pub fn list_call(&self) -> TransactionRequest {
        let calldata = match self {
            RequestOps::Mint(_) => ISynthereumPool::getMintRequestsCall {}.abi_encode(),
            RequestOps::Redeem(_) => ISynthereumPool::getRedeemRequestsCall {}.abi_encode(),
            RequestOps::Exchange(_) => ISynthereumPool::getExchangeRequestsCall {}.abi_encode(),
        };
        chain::call(self.pool(), calldata)
    }

    /// Decodes the result of [`RequestOps::list_call`].
    pub fn decode_list(&self, data: &[u8]) -> Result<Vec<Request>, ChainError> {
        Ok(match self {
            RequestOps::Mint(_) => ISynthereumPool::getMintRequestsCall::abi_decode_returns(data)?
                .into_iter()
                .map(|r| Request::Mint(r.into()))
                .collect(),
            RequestOps::Redeem(_) => {
                ISynthereumPool::getRedeemRequestsCall::abi_decode_returns(data)?
                    .into_iter()
                    .map(|r| Request::Redeem(r.into()))
                    .collect()
            }
            RequestOps::Exchange(_) => {
                ISynthereumPool::getExchangeRequestsCall::abi_decode_returns(data)?
                    .into_iter()
                    .map(|r| Request::Exchange(r.into()))
                    .collect()
            }
        })
    }

    /// Transaction approving or rejecting the request.
    pub fn resolve_call(&self, id: RequestId, decision: &Decision) -> TransactionRequest {
        let approve = decision.is_approve();
        let calldata = match self {
            RequestOps::Mint(_) if approve => ISynthereumPool::approveMintCall { mintID: id }.abi_encode(),
            RequestOps::Mint(_) => ISynthereumPool::rejectMintCall { mintID: id }.abi_encode(),
            RequestOps::Redeem(_) if approve => {
                ISynthereumPool::approveRedeemCall { redeemID: id }.abi_encode()
            }
            RequestOps::Redeem(_) => ISynthereumPool::rejectRedeemCall { redeemID: id }.abi_encode(),
            RequestOps::Exchange(_) if approve => {
                ISynthereumPool::approveExchangeCall { exchangeID: id }.abi_encode()
            }
            RequestOps::Exchange(_) => {
                ISynthereumPool::rejectExchangeCall { exchangeID: id }.abi_encode()
            }
        };
        chain::call(self.pool(), calldata)
    }

    /// Lists the pending requests of this kind.
    pub async fn list<C: ChainClient>(&self, client: &C) -> Result<Vec<Request>, ChainError> {
        let data = client.call_view(self.list_call()).await?;
        self.decode_list(&data)
    }
}
