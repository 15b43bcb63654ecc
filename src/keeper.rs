//! Polling loop: list, validate and settle pending requests of every pool.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use alloy::primitives::{Address, TxHash};
use dashmap::{DashMap, DashSet};
use fastnum::UD128;
use futures::future::join_all;
use itertools::Itertools;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    chain::ChainClient,
    ledger::TokenLedger,
    price::PriceSource,
    settle::{SettlementError, SettlementFailure, Settler},
    source::RequestOps,
    types::{Decision, Pool, RejectReason, Request, RequestId, RequestKind},
    validate::{Evaluation, Validator},
};

/// Scheduler parameters.
#[derive(Clone, Copy, Debug)]
pub struct KeeperConfig {
    /// Delay between the end of one poll and the start of the next.
    pub frequency: Duration,
    pub max_slippage: UD128,
    pub receipt_timeout: Duration,
}

/// Outcome of processing a single request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Approved,
    Rejected,
    /// Left pending without a decision, to be picked up by a later poll.
    Skipped,
    /// A decision was made but could not be settled.
    Failed,
}

/// Request counts of a single poll.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub approved: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Pool and request kind pairs whose pending requests could not be listed.
    pub list_failures: usize,
}

impl PollSummary {
    pub fn checked(&self) -> usize {
        self.approved + self.rejected + self.skipped + self.failed
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Approved => self.approved += 1,
            Outcome::Rejected => self.rejected += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

type InFlightKey = (Address, RequestKind, RequestId);

/// Marks a request as being processed until dropped.
struct InFlight<'a> {
    set: &'a DashSet<InFlightKey>,
    key: InFlightKey,
}

impl<'a> InFlight<'a> {
    fn acquire(set: &'a DashSet<InFlightKey>, key: InFlightKey) -> Option<Self> {
        set.insert(key).then(|| Self { set, key })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}

/// Keeper over a fixed set of pools.
#[derive(derive_more::Debug)]
pub struct Keeper<C, P> {
    #[debug(skip)]
    client: C,
    #[debug(skip)]
    prices: P,
    pools: Vec<Pool>,
    #[debug(skip)]
    pool_index: HashMap<Address, usize>,
    #[debug(skip)]
    ops: Vec<(usize, RequestOps)>,
    validator: Validator,
    settler: Settler,
    frequency: Duration,
    #[debug(skip)]
    in_flight: DashSet<InFlightKey>,
    /// Settlements sent in an earlier poll whose receipt has not been seen yet.
    #[debug(skip)]
    unconfirmed: DashMap<InFlightKey, TxHash>,
}

impl<C: ChainClient, P: PriceSource> Keeper<C, P> {
    pub fn new(client: C, prices: P, pools: Vec<Pool>, config: KeeperConfig) -> Self {
        let pool_index = pools
            .iter()
            .enumerate()
            .map(|(idx, pool)| (pool.address(), idx))
            .collect();
        let ops = pools
            .iter()
            .enumerate()
            .flat_map(|(idx, pool)| RequestOps::all(pool).map(|ops| (idx, ops)))
            .collect();
        Self {
            client,
            prices,
            pools,
            pool_index,
            ops,
            validator: Validator::new(config.max_slippage),
            settler: Settler::new(config.receipt_timeout),
            frequency: config.frequency,
            in_flight: DashSet::new(),
            unconfirmed: DashMap::new(),
        }
    }

    /// Replaces the settler, e.g. to shorten receipt polling.
    pub fn with_settler(mut self, settler: Settler) -> Self {
        self.settler = settler;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn prices(&self) -> &P {
        &self.prices
    }

    pub fn pools(&self) -> &[Pool] {
        &self.pools
    }

    fn pool(&self, address: Address) -> Option<&Pool> {
        self.pool_index.get(&address).map(|idx| &self.pools[*idx])
    }

    /// Polls until `shutdown` turns true or its sender is dropped.
    ///
    /// The next poll is scheduled only after the previous one has completed, so polls never
    /// overlap. A poll in progress is never interrupted by shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            pools = %self.pools.iter().map(Pool::symbol).join(","),
            frequency_ms = self.frequency.as_millis(),
            max_slippage = %self.validator.max_slippage(),
            "keeper started"
        );

        while !*shutdown.borrow() {
            self.poll().await;

            tokio::select! {
                _ = tokio::time::sleep(self.frequency) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("keeper stopped");
    }

    /// Lists and processes the pending requests of every pool and request kind once.
    pub async fn poll(&self) -> PollSummary {
        let started = Instant::now();
        self.reconcile_unconfirmed().await;

        let results = join_all(
            self.ops
                .iter()
                .map(|(idx, ops)| self.check_requests(&self.pools[*idx], ops)),
        )
        .await;

        let mut summary = PollSummary::default();
        for result in results {
            match result {
                Some(outcomes) => outcomes.into_iter().for_each(|o| summary.record(o)),
                None => summary.list_failures += 1,
            }
        }

        info!(
            approved = summary.approved,
            rejected = summary.rejected,
            skipped = summary.skipped,
            failed = summary.failed,
            list_failures = summary.list_failures,
            "checked {} requests in {:.3} seconds",
            summary.checked(),
            started.elapsed().as_secs_f64()
        );
        summary
    }

    /// Forgets unconfirmed settlements whose transactions have since been included.
    ///
    /// A request whose settlement reverted is listed again and gets re-evaluated.
    async fn reconcile_unconfirmed(&self) {
        let submitted: Vec<_> = self
            .unconfirmed
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();
        if submitted.is_empty() {
            return;
        }

        let receipts = join_all(submitted.iter().map(|(_, tx)| self.client.get_receipt(*tx))).await;
        for (((pool, kind, id), tx), receipt) in submitted.into_iter().zip(receipts) {
            let symbol = self.pool(pool).map(Pool::symbol).unwrap_or_default();
            match receipt {
                Ok(Some(receipt)) => {
                    self.unconfirmed.remove(&(pool, kind, id));
                    info!(
                        pool = symbol,
                        %kind,
                        %id,
                        tx = %tx,
                        block = ?receipt.block_number,
                        success = receipt.success,
                        "earlier settlement included"
                    );
                }
                Ok(None) => debug!(pool = symbol, %kind, %id, tx = %tx, "earlier settlement pending"),
                Err(err) => warn!(
                    pool = symbol,
                    %kind,
                    %id,
                    tx = %tx,
                    %err,
                    "failed to query earlier settlement"
                ),
            }
        }
    }

    /// Returns `None` if the pending requests could not be listed.
    async fn check_requests(&self, pool: &Pool, ops: &RequestOps) -> Option<Vec<Outcome>> {
        let requests = match ops.list(&self.client).await {
            Ok(requests) => requests,
            Err(err) => {
                warn!(pool = pool.symbol(), kind = %ops.kind(), %err, "failed to list requests");
                return None;
            }
        };
        if !requests.is_empty() {
            debug!(pool = pool.symbol(), kind = %ops.kind(), count = requests.len(), "pending requests");
        }

        Some(
            join_all(
                requests
                    .iter()
                    .map(|request| self.process(pool, ops, request)),
            )
            .await,
        )
    }

    async fn process(&self, pool: &Pool, ops: &RequestOps, request: &Request) -> Outcome {
        let id = request.id();
        let key = (pool.address(), ops.kind(), id);
        let Some(_guard) = InFlight::acquire(&self.in_flight, key) else {
            debug!(pool = pool.symbol(), kind = %ops.kind(), %id, "already in flight");
            return Outcome::Skipped;
        };
        if let Some(tx) = self.unconfirmed.get(&key).map(|tx| *tx) {
            debug!(pool = pool.symbol(), kind = %ops.kind(), %id, tx = %tx, "awaiting earlier settlement");
            return Outcome::Skipped;
        }

        let Some(decision) = self.evaluate(pool, request).await else {
            return Outcome::Skipped;
        };
        log_decision(pool, request, &decision);

        match self.settler.settle(&self.client, ops, id, &decision).await {
            Ok(receipt) => {
                info!(
                    pool = pool.symbol(),
                    kind = %ops.kind(),
                    %id,
                    tx = %receipt.tx_hash,
                    block = ?receipt.block_number,
                    gas_used = receipt.gas_used,
                    "{} confirmed",
                    if decision.is_approve() { "approval" } else { "rejection" }
                );
                if decision.is_approve() {
                    Outcome::Approved
                } else {
                    Outcome::Rejected
                }
            }
            Err(err) => {
                if let Some(tx) = err.unconfirmed_tx() {
                    self.unconfirmed.insert(key, tx);
                }
                log_settlement_failure(pool, ops.kind(), id, &err);
                Outcome::Failed
            }
        }
    }

    /// Queries the decision inputs and decides.
    ///
    /// Returns `None` if the price feed failed, leaving the request for a later poll.
    async fn evaluate(&self, pool: &Pool, request: &Request) -> Option<Decision> {
        let at = request.timestamp();
        let price = self.price(pool, request, at).await?;

        let (destination, dest_price) = match request {
            Request::Exchange(exchange) if price.is_some() => {
                match self.pool(exchange.dest_pool) {
                    Some(destination) => (
                        Some(destination),
                        self.price(destination, request, at).await?,
                    ),
                    None => {
                        warn!(
                            pool = pool.symbol(),
                            id = %request.id(),
                            dest_pool = %exchange.dest_pool,
                            "exchange destination is not a configured pool"
                        );
                        (None, None)
                    }
                }
            }
            _ => (None, None),
        };

        let holdings = match self
            .validator
            .price_check(pool, request, destination, price, dest_price)
        {
            Ok(requirement) => match TokenLedger::new(&self.client).holdings(&requirement).await {
                Ok(holdings) => Some(holdings),
                Err(err) => {
                    warn!(
                        pool = pool.symbol(),
                        kind = %request.kind(),
                        id = %request.id(),
                        token = %requirement.token.address,
                        %err,
                        "failed to query holdings"
                    );
                    None
                }
            },
            // Rejected on price alone, holdings are irrelevant
            Err(_) => None,
        };

        Some(self.validator.decide(&Evaluation {
            pool,
            request,
            destination,
            price,
            dest_price,
            holdings,
        }))
    }

    /// Outer `None` on feed failure, inner `None` if the market was closed.
    async fn price(&self, pool: &Pool, request: &Request, at: u64) -> Option<Option<UD128>> {
        match self.prices.price_at(pool.price_feed(), at).await {
            Ok(quote) => Some(quote.map(|q| q.value)),
            Err(err) => {
                warn!(
                    pool = pool.symbol(),
                    kind = %request.kind(),
                    id = %request.id(),
                    pair = pool.price_feed(),
                    at,
                    %err,
                    "price feed failed, leaving request pending"
                );
                None
            }
        }
    }
}

fn log_decision(pool: &Pool, request: &Request, decision: &Decision) {
    let (kind, id, sender) = (request.kind(), request.id(), request.sender());
    match decision {
        Decision::Approve => {
            info!(pool = pool.symbol(), %kind, %id, %sender, "approving request")
        }
        Decision::Reject(reason @ RejectReason::ChainQueryFailed) => {
            warn!(pool = pool.symbol(), %kind, %id, %sender, %reason, "rejecting request")
        }
        Decision::Reject(reason) => {
            info!(pool = pool.symbol(), %kind, %id, %sender, %reason, "rejecting request")
        }
    }
}

fn log_settlement_failure(pool: &Pool, kind: RequestKind, id: RequestId, err: &SettlementError) {
    let tx = err.tx_hash().map(|tx| tx.to_string()).unwrap_or_default();
    match err.failure {
        SettlementFailure::Transient => warn!(
            pool = pool.symbol(),
            %kind,
            %id,
            tx = %tx,
            err = %err.source,
            "settlement failed transiently, request will be re-evaluated"
        ),
        SettlementFailure::ContractRevert => warn!(
            pool = pool.symbol(),
            %kind,
            %id,
            tx = %tx,
            err = %err.source,
            "settlement reverted, the liquidity provider may need to top up collateral"
        ),
        SettlementFailure::KeeperFunds => error!(
            pool = pool.symbol(),
            %kind,
            %id,
            err = %err.source,
            "keeper account cannot pay for gas, top up the keeper wallet"
        ),
        SettlementFailure::Unknown => error!(
            pool = pool.symbol(),
            %kind,
            %id,
            tx = %tx,
            ?err,
            "settlement failed"
        ),
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::B256;
    use fastnum::udec128;

    use super::*;
    use crate::testing::{
        ExchangeRequestBuilder, MintRequestBuilder, MockChain, PoolBuilder, StaticPrices, USER,
        units,
    };

    fn config() -> KeeperConfig {
        KeeperConfig {
            frequency: Duration::from_millis(100),
            max_slippage: udec128!(0.01),
            receipt_timeout: Duration::from_secs(5),
        }
    }

    fn keeper(chain: &MockChain, prices: StaticPrices, pools: Vec<Pool>) -> Keeper<MockChain, StaticPrices> {
        for pool in &pools {
            chain.add_pool(pool);
            chain.fund(pool, USER);
        }
        Keeper::new(chain.clone(), prices, pools, config())
            .with_settler(Settler::new(Duration::from_secs(5)).with_poll_interval(Duration::from_millis(1)))
    }

    #[test]
    fn test_in_flight_guard() {
        let set = DashSet::new();
        let key = (Address::ZERO, RequestKind::Mint, B256::ZERO);

        let guard = InFlight::acquire(&set, key).unwrap();
        assert!(InFlight::acquire(&set, key).is_none());
        assert!(InFlight::acquire(&set, (Address::ZERO, RequestKind::Redeem, B256::ZERO)).is_some());
        drop(guard);
        assert!(InFlight::acquire(&set, key).is_some());
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_ops_resolved_per_pool_and_kind() {
        let chain = MockChain::new();
        let keeper = keeper(
            &chain,
            StaticPrices::new(),
            vec![PoolBuilder::jeur().build(), PoolBuilder::jgbp().build()],
        );

        assert_eq!(keeper.ops.len(), 6);
        assert_eq!(keeper.poll().await, PollSummary::default());
    }

    #[tokio::test]
    async fn test_feed_failure_leaves_request_pending() {
        let jeur = PoolBuilder::jeur().build();
        let chain = MockChain::new();
        let prices = StaticPrices::new();
        prices.fail("EURUSD");
        let keeper = keeper(&chain, prices, vec![jeur.clone()]);
        chain.push_mint(jeur.address(), MintRequestBuilder::new().build());

        let summary = keeper.poll().await;
        assert_eq!(summary.skipped, 1);
        assert!(chain.settlements().is_empty());
        assert_eq!(chain.pending(jeur.address()), 1);
    }

    #[tokio::test]
    async fn test_exchange_to_unknown_destination_is_rejected() {
        let jeur = PoolBuilder::jeur().build();
        let chain = MockChain::new();
        let prices = StaticPrices::new().with("EURUSD", udec128!(1.20));
        let keeper = keeper(&chain, prices, vec![jeur.clone()]);
        chain.push_exchange(
            jeur.address(),
            ExchangeRequestBuilder::new()
                .dest_pool(PoolBuilder::jgbp().build().address())
                .build(),
        );

        let summary = keeper.poll().await;
        assert_eq!(summary.rejected, 1);
        assert!(!chain.settlements()[0].approved);
        // Destination price is never looked up
        assert_eq!(keeper.prices.lookups(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfirmed_settlement_is_not_resubmitted() {
        let jeur = PoolBuilder::jeur().build();
        let chain = MockChain::new();
        let prices = StaticPrices::new().with("EURUSD", udec128!(1.20));
        let keeper = keeper(&chain, prices, vec![jeur.clone()]);
        chain.push_mint(jeur.address(), MintRequestBuilder::new().build());
        chain.withhold_receipts(true);

        // Receipt times out while the transaction sits in the mempool
        assert_eq!(keeper.poll().await.failed, 1);
        assert_eq!(chain.pending(jeur.address()), 1);
        assert_eq!(keeper.unconfirmed.len(), 1);

        // Still listed on the next tick but not sent again
        assert_eq!(keeper.poll().await.skipped, 1);
        assert_eq!(chain.settlements().len(), 1);

        chain.withhold_receipts(false);
        assert_eq!(keeper.poll().await.checked(), 0);
        assert!(keeper.unconfirmed.is_empty());
        assert_eq!(chain.settlements().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_revert_is_reevaluated() {
        let jeur = PoolBuilder::jeur().build();
        let chain = MockChain::new();
        let prices = StaticPrices::new().with("EURUSD", udec128!(1.20));
        let keeper = keeper(&chain, prices, vec![jeur.clone()]);
        chain.push_mint(jeur.address(), MintRequestBuilder::new().build());
        chain.revert_receipts(true);
        chain.withhold_receipts(true);

        assert_eq!(keeper.poll().await.failed, 1);

        // Included with a failed status, the request stays listed
        chain.withhold_receipts(false);
        chain.revert_receipts(false);
        assert_eq!(chain.pending(jeur.address()), 1);

        let summary = keeper.poll().await;
        assert_eq!(summary.approved, 1);
        assert!(keeper.unconfirmed.is_empty());
        assert_eq!(chain.settlements().len(), 2);
        assert_eq!(chain.pending(jeur.address()), 0);
    }

    #[tokio::test]
    async fn test_holdings_query_failure_rejects() {
        let jeur = PoolBuilder::jeur().build();
        let chain = MockChain::new();
        let prices = StaticPrices::new().with("EURUSD", udec128!(1.20));
        let keeper = keeper(&chain, prices, vec![jeur.clone()]);
        chain.push_mint(
            jeur.address(),
            MintRequestBuilder::new()
                .collateral(units(120, 6))
                .tokens(units(100, 18))
                .build(),
        );
        chain.fail_views(jeur.collateral().address, crate::testing::Fault::Transport);

        let summary = keeper.poll().await;
        assert_eq!(summary.rejected, 1);
        assert!(!chain.settlements()[0].approved);
    }
}
