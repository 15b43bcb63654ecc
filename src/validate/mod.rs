//! Pure decision core for pending requests.
//!
//! Every function here takes the already queried values (prices, balances,
//! allowances) as input and returns a decision, with NO side effects (no IO,
//! no logging, no state mutation).
//!
//! Validation happens in two steps so that the caller only queries the
//! ledger for requests that passed the price check:
//!
//! 1. [`Validator::price_check`] compares the request amounts at the
//!    historical price within the slippage tolerance and returns the token
//!    holdings the sender must cover.
//! 2. [`check_holdings`] verifies balance and allowance against them.
//!
//! [`Validator::decide`] runs both steps over a fully populated
//! [`Evaluation`].
//!
//! All amounts are normalized into the common 18-decimal base before any
//! multiplication by a price.

mod exchange;
mod mint;
mod redeem;

use alloy::primitives::{Address, U256};
use fastnum::UD128;

use crate::types::{Decision, Pool, RejectReason, Request, Token};

/// Request validation parameters.
#[derive(Clone, Copy, Debug)]
pub struct Validator {
    max_slippage: UD128,
}

/// Token holdings the request sender must have for the pool to move
/// `amount` on their behalf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Requirement {
    pub token: Token,
    pub owner: Address,
    pub spender: Address,
    /// In the token's native decimals.
    pub amount: U256,
}

/// Sender's balance and allowance of the required token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Holdings {
    pub balance: U256,
    pub allowance: U256,
}

/// Every input a decision depends on.
#[derive(Clone, Copy, Debug)]
pub struct Evaluation<'a> {
    pub pool: &'a Pool,
    pub request: &'a Request,
    /// Destination pool of an exchange request, if configured.
    pub destination: Option<&'a Pool>,
    /// Price at request time, `None` if the market was closed.
    pub price: Option<UD128>,
    /// Destination price at request time for exchange requests.
    pub dest_price: Option<UD128>,
    /// `None` if the ledger could not be queried.
    pub holdings: Option<Holdings>,
}

impl Validator {
    /// Creates a validator with the given slippage fraction (e.g. `0.01`).
    ///
    /// Fractions above one are clamped to one.
    pub fn new(max_slippage: UD128) -> Self {
        Self {
            max_slippage: if max_slippage > UD128::ONE {
                UD128::ONE
            } else {
                max_slippage
            },
        }
    }

    pub fn max_slippage(&self) -> UD128 {
        self.max_slippage
    }

    /// Price multiplier allowing for slippage against the user.
    fn lower_bound(&self) -> UD128 {
        UD128::ONE - self.max_slippage
    }

    /// Price multiplier allowing for slippage in favor of the user.
    fn upper_bound(&self) -> UD128 {
        UD128::ONE + self.max_slippage
    }

    /// Checks request amounts against the price at request time.
    pub fn price_check(
        &self,
        pool: &Pool,
        request: &Request,
        destination: Option<&Pool>,
        price: Option<UD128>,
        dest_price: Option<UD128>,
    ) -> Result<Requirement, RejectReason> {
        match request {
            Request::Mint(r) => self.check_mint(pool, r, price),
            Request::Redeem(r) => self.check_redeem(pool, r, price),
            Request::Exchange(r) => self.check_exchange(pool, destination, r, price, dest_price),
        }
    }

    /// Full decision over the given inputs.
    pub fn decide(&self, evaluation: &Evaluation<'_>) -> Decision {
        self.price_check(
            evaluation.pool,
            evaluation.request,
            evaluation.destination,
            evaluation.price,
            evaluation.dest_price,
        )
        .and_then(|requirement| match evaluation.holdings {
            Some(holdings) => check_holdings(&requirement, &holdings),
            None => Err(RejectReason::ChainQueryFailed),
        })
        .into()
    }
}

/// Checks the sender holds and has approved at least the required amount.
///
/// Balance is checked first.
pub fn check_holdings(requirement: &Requirement, holdings: &Holdings) -> Result<(), RejectReason> {
    if holdings.balance < requirement.amount {
        return Err(RejectReason::InsufficientBalance {
            balance: holdings.balance,
            required: requirement.amount,
        });
    }
    if holdings.allowance < requirement.amount {
        return Err(RejectReason::InsufficientAllowance {
            allowance: holdings.allowance,
            required: requirement.amount,
        });
    }
    Ok(())
}
