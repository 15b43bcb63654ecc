use fastnum::UD128;

use super::{Requirement, Validator};
use crate::{
    num,
    types::{Pool, RedeemRequest, RejectReason},
};

impl Validator {
    /// Redeem is approved only if the claimed collateral does not exceed the
    /// value of the burned tokens plus the slippage headroom:
    ///
    /// `collateral <= tokens * price * (1 + max_slippage)`
    ///
    /// The sender must then hold and have approved the synthetic tokens.
    pub fn check_redeem(
        &self,
        pool: &Pool,
        request: &RedeemRequest,
        price: Option<UD128>,
    ) -> Result<Requirement, RejectReason> {
        let price = price.ok_or(RejectReason::MarketClosed)?;

        let collateral = pool.collateral().converter().to_wei(request.collateral_amount);
        let tokens = pool.synthetic().converter().to_wei(request.num_tokens);
        let allowed = num::scale(tokens, price * self.upper_bound());

        if collateral > allowed {
            return Err(RejectReason::Overclaimed {
                requested: collateral,
                allowed,
            });
        }

        Ok(Requirement {
            token: pool.synthetic(),
            owner: request.sender,
            spender: pool.address(),
            amount: request.num_tokens,
        })
    }
}
