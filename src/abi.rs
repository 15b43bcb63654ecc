//! Contract interfaces the keeper talks to.

#[allow(clippy::too_many_arguments)]
pub mod pool {
    alloy_sol_types::sol!(
        /// Synthetic-asset pool (TIC) with pending request queues.
        #[derive(Debug)]
        interface ISynthereumPool {
            struct FixedPoint {
                uint256 rawValue;
            }

            struct MintRequest {
                bytes32 mintID;
                uint256 timestamp;
                address sender;
                FixedPoint collateralAmount;
                FixedPoint numTokens;
            }

            struct RedeemRequest {
                bytes32 redeemID;
                uint256 timestamp;
                address sender;
                FixedPoint collateralAmount;
                FixedPoint numTokens;
            }

            struct ExchangeRequest {
                bytes32 exchangeID;
                uint256 timestamp;
                address sender;
                address destTIC;
                FixedPoint numTokens;
                FixedPoint collateralAmount;
                FixedPoint destNumTokens;
            }

            function collateralToken() external view returns (address);
            function syntheticToken() external view returns (address);

            function getMintRequests() external view returns (MintRequest[] memory);
            function getRedeemRequests() external view returns (RedeemRequest[] memory);
            function getExchangeRequests() external view returns (ExchangeRequest[] memory);

            function approveMint(bytes32 mintID) external;
            function rejectMint(bytes32 mintID) external;
            function approveRedeem(bytes32 redeemID) external;
            function rejectRedeem(bytes32 redeemID) external;
            function approveExchange(bytes32 exchangeID) external;
            function rejectExchange(bytes32 exchangeID) external;
        }
    );
}

pub mod erc20 {
    alloy_sol_types::sol!(
        #[derive(Debug)]
        interface IERC20 {
            function decimals() external view returns (uint8);
            function balanceOf(address owner) external view returns (uint256);
            function allowance(address owner, address spender) external view returns (uint256);
        }
    );
}

pub mod factory {
    alloy_sol_types::sol!(
        /// Registry mapping synthetic symbols to their pool contracts.
        #[derive(Debug)]
        interface ISynthereumFactory {
            function symbolToTIC(string symbol) external view returns (address);
        }
    );
}
