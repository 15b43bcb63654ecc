//! Chain client boundary.
//!
//! The keeper only needs four capabilities from a node: view calls, gas
//! estimation, transaction submission and receipt lookup. [`ChainClient`]
//! captures them, [`RpcChainClient`] implements them over an `alloy` provider.

use std::future::Future;

use alloy::{
    network::EthereumWallet,
    primitives::{Address, Bytes, TxHash},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::{
        client::RpcClient,
        types::{TransactionInput, TransactionRequest},
    },
    transports::layers::RetryBackoffLayer,
};
use url::Url;

use crate::error::ChainError;

/// Inclusion receipt of a submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    pub success: bool,
}

/// Capabilities the keeper requires from a blockchain node.
pub trait ChainClient: Send + Sync {
    /// Account all transactions are sent from.
    fn sender(&self) -> Address;

    fn call_view(&self, tx: TransactionRequest)
    -> impl Future<Output = Result<Bytes, ChainError>> + Send;

    fn estimate_gas(
        &self,
        tx: TransactionRequest,
    ) -> impl Future<Output = Result<u64, ChainError>> + Send;

    fn send_transaction(
        &self,
        tx: TransactionRequest,
    ) -> impl Future<Output = Result<TxHash, ChainError>> + Send;

    /// Returns `None` while the transaction is not yet included.
    fn get_receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<Option<Receipt>, ChainError>> + Send;

    fn chain_id(&self) -> impl Future<Output = Result<u64, ChainError>> + Send;
}

/// Builds a call to `to` with the given ABI-encoded calldata.
pub fn call(to: Address, calldata: Vec<u8>) -> TransactionRequest {
    TransactionRequest::default()
        .to(to)
        .input(TransactionInput::new(calldata.into()))
}

/// [`ChainClient`] backed by a JSON-RPC node.
#[derive(Clone, Debug)]
pub struct RpcChainClient {
    provider: DynProvider,
    sender: Address,
}

impl RpcChainClient {
    /// Connects to the node over HTTP, signing with the given wallet.
    ///
    /// Transient transport failures are retried by the underlying client.
    pub fn new(node_url: Url, wallet: EthereumWallet) -> Self {
        let sender = wallet.default_signer().address();
        let rpc_client = RpcClient::builder()
            .layer(RetryBackoffLayer::new(10, 100, 200))
            .http(node_url);
        let provider = DynProvider::new(
            ProviderBuilder::new()
                .wallet(wallet)
                .connect_client(rpc_client),
        );
        Self { provider, sender }
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }
}

impl ChainClient for RpcChainClient {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn call_view(&self, tx: TransactionRequest) -> Result<Bytes, ChainError> {
        Ok(self.provider.call(tx.from(self.sender)).await?)
    }

    async fn estimate_gas(&self, tx: TransactionRequest) -> Result<u64, ChainError> {
        Ok(self.provider.estimate_gas(tx.from(self.sender)).await?)
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, ChainError> {
        let pending = self.provider.send_transaction(tx.from(self.sender)).await?;
        Ok(*pending.tx_hash())
    }

    async fn get_receipt(&self, tx_hash: TxHash) -> Result<Option<Receipt>, ChainError> {
        let receipt = self.provider.get_transaction_receipt(tx_hash).await?;
        Ok(receipt.map(|r| Receipt {
            tx_hash: r.transaction_hash,
            block_number: r.block_number,
            gas_used: r.gas_used,
            success: r.status(),
        }))
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.provider.get_chain_id().await?)
    }
}
