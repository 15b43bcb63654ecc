use fastnum::UD128;

use super::{Requirement, Validator};
use crate::{
    num,
    types::{MintRequest, Pool, RejectReason},
};

impl Validator {
    /// Mint is approved only if the deposited collateral covers the tokens
    /// at the request-time price, less the slippage allowance:
    ///
    /// `collateral >= tokens * price * (1 - max_slippage)`
    ///
    /// The sender must then hold and have approved the collateral.
    pub fn check_mint(
        &self,
        pool: &Pool,
        request: &MintRequest,
        price: Option<UD128>,
    ) -> Result<Requirement, RejectReason> {
        let price = price.ok_or(RejectReason::MarketClosed)?;

        let collateral = pool.collateral().converter().to_wei(request.collateral_amount);
        let tokens = pool.synthetic().converter().to_wei(request.num_tokens);
        let required = num::scale(tokens, price * self.lower_bound());

        if collateral < required {
            return Err(RejectReason::Undercollateralized {
                provided: collateral,
                required,
            });
        }

        Ok(Requirement {
            token: pool.collateral(),
            owner: request.sender,
            spender: pool.address(),
            amount: request.collateral_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::U256;
    use fastnum::udec128;

    use super::*;
    use crate::{
        testing::{MintRequestBuilder, PoolBuilder, units},
        types::{Decision, Request},
        validate::{Evaluation, Holdings},
    };

    fn decide(collateral: U256, tokens: U256, holdings: Holdings) -> Decision {
        let pool = PoolBuilder::jeur().build();
        let request = Request::Mint(
            MintRequestBuilder::new()
                .collateral(collateral)
                .tokens(tokens)
                .build(),
        );
        Validator::new(udec128!(0.01)).decide(&Evaluation {
            pool: &pool,
            request: &request,
            destination: None,
            price: Some(udec128!(1.20)),
            dest_price: None,
            holdings: Some(holdings),
        })
    }

    fn holdings(balance: U256, allowance: U256) -> Holdings {
        Holdings { balance, allowance }
    }

    #[test]
    fn test_mint_covered_within_slippage_is_approved() {
        // 100 jEUR at 1.20 with 1% slippage requires at least 118.8 USDC
        let collateral = units(120, 6);
        assert_eq!(
            decide(collateral, units(100, 18), holdings(collateral, collateral)),
            Decision::Approve
        );
    }

    #[test]
    fn test_mint_at_exact_minimum_is_approved() {
        let collateral = U256::from(118_800_000u64);
        assert_eq!(
            decide(collateral, units(100, 18), holdings(collateral, collateral)),
            Decision::Approve
        );
    }

    #[test]
    fn test_mint_undercollateralized_is_rejected() {
        let collateral = units(118, 6);
        assert_eq!(
            decide(collateral, units(100, 18), holdings(collateral, collateral)),
            Decision::Reject(RejectReason::Undercollateralized {
                provided: units(118, 18),
                required: U256::from(118_800_000_000_000_000_000u128),
            })
        );
    }

    #[test]
    fn test_mint_insufficient_allowance_is_distinct() {
        let collateral = units(120, 6);
        let decision = decide(collateral, units(100, 18), holdings(collateral, units(50, 6)));
        assert_eq!(
            decision,
            Decision::Reject(RejectReason::InsufficientAllowance {
                allowance: units(50, 6),
                required: collateral,
            })
        );
    }

    #[test]
    fn test_mint_insufficient_balance() {
        let collateral = units(120, 6);
        let decision = decide(collateral, units(100, 18), holdings(units(119, 6), collateral));
        assert!(matches!(
            decision,
            Decision::Reject(RejectReason::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn test_mint_requirement_targets_collateral_token() {
        let pool = PoolBuilder::jeur().build();
        let request = MintRequestBuilder::new()
            .collateral(units(120, 6))
            .tokens(units(100, 18))
            .build();

        let requirement = Validator::new(udec128!(0.01))
            .check_mint(&pool, &request, Some(udec128!(1.20)))
            .unwrap();

        assert_eq!(requirement.token, pool.collateral());
        assert_eq!(requirement.owner, request.sender);
        assert_eq!(requirement.spender, pool.address());
        assert_eq!(requirement.amount, units(120, 6));
    }

    #[test]
    fn test_mint_market_closed() {
        let pool = PoolBuilder::jeur().build();
        let request = MintRequestBuilder::new().build();
        assert_eq!(
            Validator::new(udec128!(0.01)).check_mint(&pool, &request, None),
            Err(RejectReason::MarketClosed)
        );
    }
}
