use fastnum::UD128;

use super::{Requirement, Validator};
use crate::{
    num,
    types::{ExchangeRequest, Pool, RejectReason},
};

impl Validator {
    /// Exchange is approved only if the value given up at the source covers
    /// the value received at the destination, less the slippage allowance:
    ///
    /// `tokens * price >= dest_tokens * dest_price * (1 - max_slippage)`
    ///
    /// Source and destination amounts are normalized with their own pool's
    /// synthetic token decimals. The sender must then hold and have approved
    /// the source synthetic tokens.
    pub fn check_exchange(
        &self,
        pool: &Pool,
        destination: Option<&Pool>,
        request: &ExchangeRequest,
        price: Option<UD128>,
        dest_price: Option<UD128>,
    ) -> Result<Requirement, RejectReason> {
        let price = price.ok_or(RejectReason::MarketClosed)?;
        let destination = destination.ok_or(RejectReason::UnknownDestination)?;
        let dest_price = dest_price.ok_or(RejectReason::MarketClosed)?;

        let tokens = pool.synthetic().converter().to_wei(request.num_tokens);
        let dest_tokens = destination
            .synthetic()
            .converter()
            .to_wei(request.dest_num_tokens);

        let source_value = num::scale(tokens, price);
        let dest_value = num::scale(dest_tokens, dest_price * self.lower_bound());

        if source_value < dest_value {
            return Err(RejectReason::ExcessiveDestination {
                source_value,
                dest_value,
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
