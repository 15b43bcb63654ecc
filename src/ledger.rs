//! ERC-20 balance and allowance reads.

use alloy::primitives::{Address, U256};
use alloy_sol_types::SolCall;

use crate::{
    abi::erc20::IERC20,
    chain::{self, ChainClient},
    error::ChainError,
    validate::{Holdings, Requirement},
};

/// Reads token holdings through a [`ChainClient`].
#[derive(Clone, Copy, Debug)]
pub struct TokenLedger<'a, C> {
    client: &'a C,
}

impl<'a, C: ChainClient> TokenLedger<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    pub async fn balance_of(&self, token: Address, owner: Address) -> Result<U256, ChainError> {
        let calldata = IERC20::balanceOfCall { owner }.abi_encode();
        let data = self.client.call_view(chain::call(token, calldata)).await?;
        Ok(IERC20::balanceOfCall::abi_decode_returns(&data)?)
    }

    pub async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        let calldata = IERC20::allowanceCall { owner, spender }.abi_encode();
        let data = self.client.call_view(chain::call(token, calldata)).await?;
        Ok(IERC20::allowanceCall::abi_decode_returns(&data)?)
    }

    pub async fn decimals(&self, token: Address) -> Result<u8, ChainError> {
        let data = self
            .client
            .call_view(chain::call(token, IERC20::decimalsCall {}.abi_encode()))
            .await?;
        Ok(IERC20::decimalsCall::abi_decode_returns(&data)?)
    }

    /// Balance and allowance the requirement is checked against.
    pub async fn holdings(&self, requirement: &Requirement) -> Result<Holdings, ChainError> {
        let token = requirement.token.address;
        let (balance, allowance) = futures::try_join!(
            self.balance_of(token, requirement.owner),
            self.allowance(token, requirement.owner, requirement.spender),
        )?;
        Ok(Holdings { balance, allowance })
    }
}
