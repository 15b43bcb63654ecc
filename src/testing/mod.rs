//! In-memory collaborators and test utilities.
//!
//! [`MockChain`] answers pool, ERC-20 and factory view calls from in-memory state, records every
//! submitted settlement and can be told to fail. Approving or rejecting a request removes it from
//! the pool's pending list, as the contract would.
//!
//! [`StaticPrices`] serves fixed prices per pair.
//!
//! [`PoolBuilder`] and the request builders create test instances with controlled values for unit
//! testing the validation rules.
//!

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use alloy::{
    primitives::{Address, B256, Bytes, TxHash, TxKind, U256, address},
    rpc::types::TransactionRequest,
};
use alloy_sol_types::SolCall;
use dashmap::{DashMap, DashSet};
use fastnum::UD128;

use crate::{
    abi::{erc20::IERC20, factory::ISynthereumFactory, pool::ISynthereumPool},
    chain::{ChainClient, Receipt},
    error::{ChainError, PriceFeedError},
    price::{PriceCache, PriceQuote, PriceSource},
    types::{
        ExchangeRequest, MintRequest, Pool, RedeemRequest, RequestId, RequestKind, Timestamp,
        Token,
    },
};

/// Keeper account of [`MockChain`].
pub const KEEPER: Address = address!("0x00000000000000000000000000000000000000ee");

/// Default sender of built requests.
pub const USER: Address = address!("0x0000000000000000000000000000000000000a11");

/// USDC-like collateral shared by the built pools.
pub const COLLATERAL: Address = address!("0x00000000000000000000000000000000000c0111");

/// Default request timestamp.
pub const REQUEST_TIME: Timestamp = 1_600_000_000;

const CHAIN_ID: u64 = 42;
const GAS_ESTIMATE: u64 = 150_000;

/// `n` whole tokens in the given precision.
pub fn units(n: u64, decimals: u8) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(decimals))
}

/// Failure injected into [`MockChain`] calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    BlockNotFound,
    Reverted,
    Transport,
    Timeout,
    /// Keeper account cannot pay for gas.
    OutOfFunds,
}

impl Fault {
    fn error(&self) -> ChainError {
        match self {
            Fault::BlockNotFound => ChainError::BlockNotFound("block not found".into()),
            Fault::Reverted => {
                ChainError::Reverted("execution reverted: ValueError insufficient collateral".into())
            }
            Fault::Transport => ChainError::Transport("connection reset by peer".into()),
            Fault::Timeout => ChainError::Timeout,
            Fault::OutOfFunds => {
                ChainError::InvalidRequest("insufficient funds for gas * price + value".into())
            }
        }
    }
}

/// Approve or reject transaction observed by [`MockChain`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub pool: Address,
    pub kind: RequestKind,
    pub id: RequestId,
    pub approved: bool,
    pub nonce: u64,
    pub tx_hash: TxHash,
}

#[derive(Debug, Default)]
struct PoolState {
    collateral: Address,
    synthetic: Address,
    mints: Vec<MintRequest>,
    redeems: Vec<RedeemRequest>,
    exchanges: Vec<ExchangeRequest>,
}

#[derive(Debug, Default)]
struct State {
    chain_id: AtomicU64,
    nonce: AtomicU64,
    block: AtomicU64,
    pools: DashMap<Address, PoolState>,
    tokens: DashMap<Address, u8>,
    balances: DashMap<(Address, Address), U256>,
    allowances: DashMap<(Address, Address, Address), U256>,
    factories: DashMap<(Address, String), Address>,
    view_faults: DashMap<Address, Fault>,
    estimate_fault: Mutex<Option<Fault>>,
    send_fault: Mutex<Option<Fault>>,
    reverting: DashSet<TxHash>,
    revert_receipts: AtomicBool,
    withhold_receipts: AtomicBool,
    mempool: Mutex<Vec<Settlement>>,
    latency: Mutex<Duration>,
    submitting: AtomicUsize,
    max_submitting: AtomicUsize,
    settlements: Mutex<Vec<Settlement>>,
}

/// In-memory [`ChainClient`] with pool, ERC-20 and factory contracts.
///
/// Clones share the same state.
#[derive(Clone, Debug, Default)]
pub struct MockChain {
    state: Arc<State>,
}

impl MockChain {
    pub fn new() -> Self {
        let chain = Self::default();
        chain.state.chain_id.store(CHAIN_ID, Ordering::SeqCst);
        chain
    }

    pub fn set_chain_id(&self, chain_id: u64) {
        self.state.chain_id.store(chain_id, Ordering::SeqCst);
    }

    /// Deploys an ERC-20 token with the given precision.
    pub fn set_token(&self, token: Address, decimals: u8) {
        self.state.tokens.insert(token, decimals);
    }

    pub fn set_balance(&self, token: Address, owner: Address, amount: U256) {
        self.state.balances.insert((token, owner), amount);
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, amount: U256) {
        self.state.allowances.insert((token, owner, spender), amount);
    }

    /// Gives `owner` enough balance and allowance of both pool tokens for any test request.
    pub fn fund(&self, pool: &Pool, owner: Address) {
        for token in [pool.collateral(), pool.synthetic()] {
            self.set_balance(token.address, owner, U256::MAX);
            self.set_allowance(token.address, owner, pool.address(), U256::MAX);
        }
    }

    /// Deploys the pool contract along with its tokens.
    pub fn add_pool(&self, pool: &Pool) {
        self.set_token(pool.collateral().address, pool.collateral().decimals);
        self.set_token(pool.synthetic().address, pool.synthetic().decimals);
        self.state.pools.insert(
            pool.address(),
            PoolState {
                collateral: pool.collateral().address,
                synthetic: pool.synthetic().address,
                ..Default::default()
            },
        );
    }

    /// Registers `pool` under `symbol` in the factory at `factory`.
    pub fn register_symbol(&self, factory: Address, symbol: &str, pool: Address) {
        self.state.factories.insert((factory, symbol.to_owned()), pool);
    }

    pub fn push_mint(&self, pool: Address, request: MintRequest) {
        if let Some(mut state) = self.state.pools.get_mut(&pool) {
            state.mints.push(request);
        }
    }

    pub fn push_redeem(&self, pool: Address, request: RedeemRequest) {
        if let Some(mut state) = self.state.pools.get_mut(&pool) {
            state.redeems.push(request);
        }
    }

    pub fn push_exchange(&self, pool: Address, request: ExchangeRequest) {
        if let Some(mut state) = self.state.pools.get_mut(&pool) {
            state.exchanges.push(request);
        }
    }

    /// Number of requests still pending in the pool.
    pub fn pending(&self, pool: Address) -> usize {
        self.state
            .pools
            .get(&pool)
            .map(|state| state.mints.len() + state.redeems.len() + state.exchanges.len())
            .unwrap_or_default()
    }

    /// Fails every view call to `contract`.
    pub fn fail_views(&self, contract: Address, fault: Fault) {
        self.state.view_faults.insert(contract, fault);
    }

    pub fn fail_estimates(&self, fault: Option<Fault>) {
        *self.state.estimate_fault.lock().unwrap() = fault;
    }

    pub fn fail_sends(&self, fault: Option<Fault>) {
        *self.state.send_fault.lock().unwrap() = fault;
    }

    /// Includes subsequent transactions with a failed status.
    pub fn revert_receipts(&self, revert: bool) {
        self.state.revert_receipts.store(revert, Ordering::SeqCst);
    }

    /// Keeps subsequent transactions in the mempool, so their requests stay listed and no
    /// receipt is available. Turning it off includes the held transactions.
    pub fn withhold_receipts(&self, withhold: bool) {
        self.state.withhold_receipts.store(withhold, Ordering::SeqCst);
        if !withhold {
            let held = std::mem::take(&mut *self.state.mempool.lock().unwrap());
            held.iter()
                .filter(|settlement| !self.state.reverting.contains(&settlement.tx_hash))
                .for_each(|settlement| self.resolve(settlement));
        }
    }

    /// Delays gas estimation, widening the window between estimation and submission.
    pub fn set_latency(&self, latency: Duration) {
        *self.state.latency.lock().unwrap() = latency;
    }

    /// Settlement transactions in submission order.
    pub fn settlements(&self) -> Vec<Settlement> {
        self.state.settlements.lock().unwrap().clone()
    }

    /// Largest number of submissions observed between gas estimation and send.
    pub fn max_concurrent_submissions(&self) -> usize {
        self.state.max_submitting.load(Ordering::SeqCst)
    }

    fn view(&self, to: Address, input: &[u8]) -> Result<Bytes, ChainError> {
        if let Some(fault) = self.state.view_faults.get(&to) {
            return Err(fault.error());
        }
        let Some(selector) = input.get(..4).and_then(|s| <[u8; 4]>::try_from(s).ok()) else {
            return Ok(Bytes::new());
        };

        if let Some(pool) = self.state.pools.get(&to) {
            let encoded = match selector {
                ISynthereumPool::collateralTokenCall::SELECTOR => {
                    ISynthereumPool::collateralTokenCall::abi_encode_returns(&pool.collateral)
                }
                ISynthereumPool::syntheticTokenCall::SELECTOR => {
                    ISynthereumPool::syntheticTokenCall::abi_encode_returns(&pool.synthetic)
                }
                ISynthereumPool::getMintRequestsCall::SELECTOR => {
                    let requests: Vec<_> = pool.mints.iter().map(encode_mint).collect();
                    ISynthereumPool::getMintRequestsCall::abi_encode_returns(&requests)
                }
                ISynthereumPool::getRedeemRequestsCall::SELECTOR => {
                    let requests: Vec<_> = pool.redeems.iter().map(encode_redeem).collect();
                    ISynthereumPool::getRedeemRequestsCall::abi_encode_returns(&requests)
                }
                ISynthereumPool::getExchangeRequestsCall::SELECTOR => {
                    let requests: Vec<_> = pool.exchanges.iter().map(encode_exchange).collect();
                    ISynthereumPool::getExchangeRequestsCall::abi_encode_returns(&requests)
                }
                _ => return Err(ChainError::Reverted("unknown pool method".into())),
            };
            return Ok(encoded.into());
        }

        if let Some(decimals) = self.state.tokens.get(&to) {
            let encoded = match selector {
                IERC20::decimalsCall::SELECTOR => {
                    IERC20::decimalsCall::abi_encode_returns(&*decimals)
                }
                IERC20::balanceOfCall::SELECTOR => {
                    let call = IERC20::balanceOfCall::abi_decode(input)?;
                    let balance = self
                        .state
                        .balances
                        .get(&(to, call.owner))
                        .map(|b| *b)
                        .unwrap_or_default();
                    IERC20::balanceOfCall::abi_encode_returns(&balance)
                }
                IERC20::allowanceCall::SELECTOR => {
                    let call = IERC20::allowanceCall::abi_decode(input)?;
                    let allowance = self
                        .state
                        .allowances
                        .get(&(to, call.owner, call.spender))
                        .map(|a| *a)
                        .unwrap_or_default();
                    IERC20::allowanceCall::abi_encode_returns(&allowance)
                }
                _ => return Err(ChainError::Reverted("unknown token method".into())),
            };
            return Ok(encoded.into());
        }

        if selector == ISynthereumFactory::symbolToTICCall::SELECTOR {
            let call = ISynthereumFactory::symbolToTICCall::abi_decode(input)?;
            let pool = self
                .state
                .factories
                .get(&(to, call.symbol))
                .map(|p| *p)
                .unwrap_or_default();
            return Ok(ISynthereumFactory::symbolToTICCall::abi_encode_returns(&pool).into());
        }

        // Calls to accounts without code succeed with empty output
        Ok(Bytes::new())
    }

    /// Decodes a settlement transaction.
    fn decode(to: Address, input: &[u8], nonce: u64, tx_hash: TxHash) -> Option<Settlement> {
        let selector: [u8; 4] = input.get(..4)?.try_into().ok()?;
        let (kind, id, approved) = match selector {
            ISynthereumPool::approveMintCall::SELECTOR => (
                RequestKind::Mint,
                ISynthereumPool::approveMintCall::abi_decode(input).ok()?.mintID,
                true,
            ),
            ISynthereumPool::rejectMintCall::SELECTOR => (
                RequestKind::Mint,
                ISynthereumPool::rejectMintCall::abi_decode(input).ok()?.mintID,
                false,
            ),
            ISynthereumPool::approveRedeemCall::SELECTOR => (
                RequestKind::Redeem,
                ISynthereumPool::approveRedeemCall::abi_decode(input).ok()?.redeemID,
                true,
            ),
            ISynthereumPool::rejectRedeemCall::SELECTOR => (
                RequestKind::Redeem,
                ISynthereumPool::rejectRedeemCall::abi_decode(input).ok()?.redeemID,
                false,
            ),
            ISynthereumPool::approveExchangeCall::SELECTOR => (
                RequestKind::Exchange,
                ISynthereumPool::approveExchangeCall::abi_decode(input).ok()?.exchangeID,
                true,
            ),
            ISynthereumPool::rejectExchangeCall::SELECTOR => (
                RequestKind::Exchange,
                ISynthereumPool::rejectExchangeCall::abi_decode(input).ok()?.exchangeID,
                false,
            ),
            _ => return None,
        };

        Some(Settlement {
            pool: to,
            kind,
            id,
            approved,
            nonce,
            tx_hash,
        })
    }

    /// Removes the settled request from its pool.
    fn resolve(&self, settlement: &Settlement) {
        let Some(mut pool) = self.state.pools.get_mut(&settlement.pool) else {
            return;
        };
        let id = settlement.id;
        match settlement.kind {
            RequestKind::Mint => pool.mints.retain(|r| r.id != id),
            RequestKind::Redeem => pool.redeems.retain(|r| r.id != id),
            RequestKind::Exchange => pool.exchanges.retain(|r| r.id != id),
        }
    }

    fn end_submission(&self) {
        self.state.submitting.fetch_sub(1, Ordering::SeqCst);
    }
}

fn target(tx: &TransactionRequest) -> Address {
    match tx.to {
        Some(TxKind::Call(to)) => to,
        _ => Address::ZERO,
    }
}

fn input(tx: &TransactionRequest) -> &[u8] {
    tx.input.input().map(|b| &b[..]).unwrap_or_default()
}

impl ChainClient for MockChain {
    fn sender(&self) -> Address {
        KEEPER
    }

    async fn call_view(&self, tx: TransactionRequest) -> Result<Bytes, ChainError> {
        self.view(target(&tx), input(&tx))
    }

    async fn estimate_gas(&self, _tx: TransactionRequest) -> Result<u64, ChainError> {
        let submitting = self.state.submitting.fetch_add(1, Ordering::SeqCst) + 1;
        self.state
            .max_submitting
            .fetch_max(submitting, Ordering::SeqCst);

        let latency = *self.state.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let fault = *self.state.estimate_fault.lock().unwrap();
        if let Some(fault) = fault {
            self.end_submission();
            return Err(fault.error());
        }
        Ok(GAS_ESTIMATE)
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash, ChainError> {
        self.end_submission();
        let fault = *self.state.send_fault.lock().unwrap();
        if let Some(fault) = fault {
            return Err(fault.error());
        }

        let nonce = self.state.nonce.fetch_add(1, Ordering::SeqCst);
        let tx_hash = B256::from(U256::from(nonce + 1));
        let reverting = self.state.revert_receipts.load(Ordering::SeqCst);
        if reverting {
            self.state.reverting.insert(tx_hash);
        }
        if let Some(settlement) = Self::decode(target(&tx), input(&tx), nonce, tx_hash) {
            if self.state.withhold_receipts.load(Ordering::SeqCst) {
                self.state.mempool.lock().unwrap().push(settlement.clone());
            } else if !reverting {
                self.resolve(&settlement);
            }
            self.state.settlements.lock().unwrap().push(settlement);
        }
        Ok(tx_hash)
    }

    async fn get_receipt(&self, tx_hash: TxHash) -> Result<Option<Receipt>, ChainError> {
        if self.state.withhold_receipts.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(Receipt {
            tx_hash,
            block_number: Some(self.state.block.fetch_add(1, Ordering::SeqCst) + 1),
            gas_used: GAS_ESTIMATE,
            success: !self.state.reverting.contains(&tx_hash),
        }))
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.state.chain_id.load(Ordering::SeqCst))
    }
}

fn fixed(value: U256) -> ISynthereumPool::FixedPoint {
    ISynthereumPool::FixedPoint { rawValue: value }
}

fn encode_mint(request: &MintRequest) -> ISynthereumPool::MintRequest {
    ISynthereumPool::MintRequest {
        mintID: request.id,
        timestamp: U256::from(request.timestamp),
        sender: request.sender,
        collateralAmount: fixed(request.collateral_amount),
        numTokens: fixed(request.num_tokens),
    }
}

fn encode_redeem(request: &RedeemRequest) -> ISynthereumPool::RedeemRequest {
    ISynthereumPool::RedeemRequest {
        redeemID: request.id,
        timestamp: U256::from(request.timestamp),
        sender: request.sender,
        collateralAmount: fixed(request.collateral_amount),
        numTokens: fixed(request.num_tokens),
    }
}

fn encode_exchange(request: &ExchangeRequest) -> ISynthereumPool::ExchangeRequest {
    ISynthereumPool::ExchangeRequest {
        exchangeID: request.id,
        timestamp: U256::from(request.timestamp),
        sender: request.sender,
        destTIC: request.dest_pool,
        numTokens: fixed(request.num_tokens),
        collateralAmount: fixed(request.collateral_amount),
        destNumTokens: fixed(request.dest_num_tokens),
    }
}

/// [`PriceSource`] serving fixed raw quotes.
#[derive(Debug, Default)]
pub struct StaticPrices {
    cache: PriceCache,
    failing: DashSet<String>,
    lookups: AtomicUsize,
}

impl StaticPrices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quotes `pair` at `price` from the beginning of time.
    pub fn with(self, pair: &str, price: UD128) -> Self {
        self.cache.insert(pair, 0, price);
        self
    }

    /// Quotes `pair` at `price` from `at` onwards.
    pub fn set_at(&self, pair: &str, at: Timestamp, price: UD128) {
        self.cache.insert(pair, at, price);
    }

    /// Makes lookups of `pair` fail with a feed error.
    pub fn fail(&self, pair: &str) {
        self.failing.insert(pair.to_owned());
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl PriceSource for StaticPrices {
    async fn price_at(
        &self,
        pair: &str,
        at: Timestamp,
    ) -> Result<Option<PriceQuote>, PriceFeedError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(pair) {
            return Err(PriceFeedError::Status(503));
        }
        Ok(self.cache.latest_at(pair, at))
    }
}

/// Builder for test [`Pool`] instances.
///
/// # Example
///
/// ```
/// use synth_keeper::testing::PoolBuilder;
///
/// let pool = PoolBuilder::jeur().synthetic_decimals(8).build();
/// assert_eq!(pool.price_feed(), "EURUSD");
/// assert_eq!(pool.synthetic().decimals, 8);
/// ```
#[derive(Clone, Debug)]
pub struct PoolBuilder {
    symbol: String,
    price_feed: String,
    address: Address,
    collateral: Token,
    synthetic: Token,
}

impl PoolBuilder {
    /// jEUR pool collateralized with a 6-decimal stablecoin.
    pub fn jeur() -> Self {
        Self {
            symbol: "jEUR".into(),
            price_feed: "EURUSD".into(),
            address: address!("0x00000000000000000000000000000000000a0001"),
            collateral: Token::new(COLLATERAL, 6),
            synthetic: Token::new(address!("0x00000000000000000000000000000000000e0001"), 18),
        }
    }

    /// jGBP pool sharing the jEUR collateral.
    pub fn jgbp() -> Self {
        Self {
            symbol: "jGBP".into(),
            price_feed: "GBPUSD".into(),
            address: address!("0x00000000000000000000000000000000000a0002"),
            collateral: Token::new(COLLATERAL, 6),
            synthetic: Token::new(address!("0x00000000000000000000000000000000000e0002"), 18),
        }
    }

    /// jCHF pool priced off the reversed USDCHF pair.
    pub fn jchf() -> Self {
        Self {
            symbol: "jCHF".into(),
            price_feed: "USDCHF".into(),
            address: address!("0x00000000000000000000000000000000000a0003"),
            collateral: Token::new(COLLATERAL, 6),
            synthetic: Token::new(address!("0x00000000000000000000000000000000000e0003"), 18),
        }
    }

    pub fn symbol(mut self, symbol: &str) -> Self {
        self.symbol = symbol.into();
        self
    }

    pub fn price_feed(mut self, price_feed: &str) -> Self {
        self.price_feed = price_feed.into();
        self
    }

    pub fn address(mut self, address: Address) -> Self {
        self.address = address;
        self
    }

    pub fn collateral_decimals(mut self, decimals: u8) -> Self {
        self.collateral.decimals = decimals;
        self
    }

    pub fn synthetic_decimals(mut self, decimals: u8) -> Self {
        self.synthetic.decimals = decimals;
        self
    }

    pub fn build(self) -> Pool {
        Pool::new(
            self.symbol,
            self.price_feed,
            self.address,
            self.collateral,
            self.synthetic,
        )
    }
}

/// Builder for test [`MintRequest`] instances.
///
/// Defaults to 120 units of 6-decimal collateral for 100 units of 18-decimal tokens.
#[derive(Clone, Debug)]
pub struct MintRequestBuilder(MintRequest);

impl Default for MintRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MintRequestBuilder {
    pub fn new() -> Self {
        Self(MintRequest {
            id: B256::repeat_byte(0x01),
            timestamp: REQUEST_TIME,
            sender: USER,
            collateral_amount: units(120, 6),
            num_tokens: units(100, 18),
        })
    }

    pub fn id(mut self, id: RequestId) -> Self {
        self.0.id = id;
        self
    }

    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.0.timestamp = timestamp;
        self
    }

    pub fn sender(mut self, sender: Address) -> Self {
        self.0.sender = sender;
        self
    }

    pub fn collateral(mut self, amount: U256) -> Self {
        self.0.collateral_amount = amount;
        self
    }

    pub fn tokens(mut self, amount: U256) -> Self {
        self.0.num_tokens = amount;
        self
    }

    pub fn build(self) -> MintRequest {
        self.0
    }
}

/// Builder for test [`RedeemRequest`] instances.
///
/// Defaults to 100 units of 18-decimal tokens for 120 units of 6-decimal collateral.
#[derive(Clone, Debug)]
pub struct RedeemRequestBuilder(RedeemRequest);

impl Default for RedeemRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RedeemRequestBuilder {
    pub fn new() -> Self {
        Self(RedeemRequest {
            id: B256::repeat_byte(0x02),
            timestamp: REQUEST_TIME,
            sender: USER,
            collateral_amount: units(120, 6),
            num_tokens: units(100, 18),
        })
    }

    pub fn id(mut self, id: RequestId) -> Self {
        self.0.id = id;
        self
    }

    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.0.timestamp = timestamp;
        self
    }

    pub fn sender(mut self, sender: Address) -> Self {
        self.0.sender = sender;
        self
    }

    pub fn collateral(mut self, amount: U256) -> Self {
        self.0.collateral_amount = amount;
        self
    }

    pub fn tokens(mut self, amount: U256) -> Self {
        self.0.num_tokens = amount;
        self
    }

    pub fn build(self) -> RedeemRequest {
        self.0
    }
}

/// Builder for test [`ExchangeRequest`] instances.
#[derive(Clone, Debug)]
pub struct ExchangeRequestBuilder(ExchangeRequest);

impl Default for ExchangeRequestBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeRequestBuilder {
    pub fn new() -> Self {
        Self(ExchangeRequest {
            id: B256::repeat_byte(0x03),
            timestamp: REQUEST_TIME,
            sender: USER,
            dest_pool: Address::ZERO,
            num_tokens: units(100, 18),
            collateral_amount: units(120, 6),
            dest_num_tokens: units(90, 18),
        })
    }

    pub fn id(mut self, id: RequestId) -> Self {
        self.0.id = id;
        self
    }

    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.0.timestamp = timestamp;
        self
    }

    pub fn sender(mut self, sender: Address) -> Self {
        self.0.sender = sender;
        self
    }

    pub fn dest_pool(mut self, pool: Address) -> Self {
        self.0.dest_pool = pool;
        self
    }

    pub fn tokens(mut self, amount: U256) -> Self {
        self.0.num_tokens = amount;
        self
    }

    pub fn collateral(mut self, amount: U256) -> Self {
        self.0.collateral_amount = amount;
        self
    }

    pub fn dest_tokens(mut self, amount: U256) -> Self {
        self.0.dest_num_tokens = amount;
        self
    }

    pub fn build(self) -> ExchangeRequest {
        self.0
    }
}
