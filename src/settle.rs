//! Submission of approve/reject transactions.
//!
//! Every settlement goes through `Preparing -> Submitted -> Confirmed | Failed`:
//! gas is estimated, the transaction is signed and sent, then the receipt is polled until the
//! transaction is included or the receipt timeout expires.
//!
//! All transactions are sent from a single account, so estimation and submission are
//! serialized to keep nonces in order. Receipt polling is not, so confirmations of sibling
//! requests proceed concurrently.
//!
//! Failed settlements are never retried here. The request remains pending on chain and the next
//! poll evaluates it from scratch.

use std::{fmt, time::Duration};

use alloy::primitives::TxHash;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    chain::{ChainClient, Receipt},
    error::ChainError,
    source::RequestOps,
    types::{Decision, RequestId},
};

/// Default time to wait for a submitted transaction to be included.
pub const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default interval between receipt lookups.
pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Settlement progress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Preparing,
    Submitted(TxHash),
    Confirmed(Receipt),
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Preparing => f.write_str("preparing"),
            Stage::Submitted(tx_hash) => write!(f, "submitted {tx_hash}"),
            Stage::Confirmed(receipt) => write!(f, "confirmed {}", receipt.tx_hash),
            Stage::Failed => f.write_str("failed"),
        }
    }
}

/// How a settlement failure should be handled by the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettlementFailure {
    /// Node-side hiccup such as a missing block; the next poll retries.
    Transient,
    /// Pool rejected the call, typically because the liquidity provider lacks collateral.
    ContractRevert,
    /// Keeper account cannot pay for gas.
    KeeperFunds,
    Unknown,
}

impl SettlementFailure {
    pub fn classify(err: &ChainError) -> Self {
        match err {
            ChainError::BlockNotFound(_) | ChainError::Timeout => SettlementFailure::Transient,
            ChainError::Reverted(_) => SettlementFailure::ContractRevert,
            other => {
                let msg = other.to_string().to_ascii_lowercase();
                if msg.contains("blocknotfound")
                    || msg.contains("block not found")
                    || msg.contains("header not found")
                {
                    SettlementFailure::Transient
                } else if msg.contains("insufficient funds") {
                    SettlementFailure::KeeperFunds
                } else if msg.contains("valueerror") || msg.contains("revert") {
                    SettlementFailure::ContractRevert
                } else {
                    SettlementFailure::Unknown
                }
            }
        }
    }
}

impl fmt::Display for SettlementFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SettlementFailure::Transient => "transient",
            SettlementFailure::ContractRevert => "contract revert",
            SettlementFailure::KeeperFunds => "keeper funds",
            SettlementFailure::Unknown => "unknown",
        })
    }
}

/// Settlement that did not reach [`Stage::Confirmed`].
#[derive(Debug, thiserror::Error)]
#[error("{failure} settlement failure after {stage}: {source}")]
pub struct SettlementError {
    pub failure: SettlementFailure,
    /// Last stage reached before failing.
    pub stage: Stage,
    #[source]
    pub source: ChainError,
}

impl SettlementError {
    fn new(stage: Stage, source: ChainError) -> Self {
        Self {
            failure: SettlementFailure::classify(&source),
            stage,
            source,
        }
    }

    /// Transaction hash, if the transaction was sent.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self.stage {
            Stage::Submitted(tx_hash) => Some(tx_hash),
            _ => None,
        }
    }

    /// Transaction that was sent but whose outcome is unknown, e.g. because the receipt did
    /// not arrive in time. It may still be included later.
    pub fn unconfirmed_tx(&self) -> Option<TxHash> {
        match self.source {
            ChainError::Reverted(_) => None,
            _ => self.tx_hash(),
        }
    }
}

/// Submits decisions back to the pools.
#[derive(Debug)]
pub struct Settler {
    submission: Mutex<()>,
    receipt_timeout: Duration,
    poll_interval: Duration,
}

impl Default for Settler {
    fn default() -> Self {
        Self::new(DEFAULT_RECEIPT_TIMEOUT)
    }
}

impl Settler {
    pub fn new(receipt_timeout: Duration) -> Self {
        Self {
            submission: Mutex::new(()),
            receipt_timeout,
            poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn receipt_timeout(&self) -> Duration {
        self.receipt_timeout
    }

    /// Approves or rejects the request and waits for inclusion.
    pub async fn settle<C: ChainClient>(
        &self,
        client: &C,
        ops: &RequestOps,
        id: RequestId,
        decision: &Decision,
    ) -> Result<Receipt, SettlementError> {
        self.submit(client, ops, id, decision)
            .await
            .inspect(|receipt| debug!(%id, stage = %Stage::Confirmed(receipt.clone()), "settling"))
            .inspect_err(|err| debug!(%id, stage = %Stage::Failed, reached = %err.stage, "settling"))
    }

    async fn submit<C: ChainClient>(
        &self,
        client: &C,
        ops: &RequestOps,
        id: RequestId,
        decision: &Decision,
    ) -> Result<Receipt, SettlementError> {
        let tx = ops.resolve_call(id, decision);
        let mut stage = Stage::Preparing;
        debug!(pool = %ops.pool(), kind = %ops.kind(), %id, %stage, "settling");

        let tx_hash = {
            let _submission = self.submission.lock().await;
            let gas = client
                .estimate_gas(tx.clone())
                .await
                .map_err(|err| SettlementError::new(stage.clone(), err))?;
            client
                .send_transaction(tx.gas_limit(gas))
                .await
                .map_err(|err| SettlementError::new(stage.clone(), err))?
        };
        stage = Stage::Submitted(tx_hash);
        debug!(%id, %stage, "settling");

        let receipt = tokio::time::timeout(self.receipt_timeout, self.wait_receipt(client, tx_hash))
            .await
            .map_err(|_| ChainError::Timeout)
            .and_then(|receipt| receipt)
            .map_err(|err| SettlementError::new(stage.clone(), err))?;

        if !receipt.success {
            return Err(SettlementError::new(
                stage,
                ChainError::Reverted(format!("transaction {tx_hash} reverted")),
            ));
        }
        Ok(receipt)
    }

    async fn wait_receipt<C: ChainClient>(
        &self,
        client: &C,
        tx_hash: TxHash,
    ) -> Result<Receipt, ChainError> {
        loop {
            if let Some(receipt) = client.get_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
