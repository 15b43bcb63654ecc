use alloy::primitives::U256;

/// Outcome of validating one request.
///
/// Produced once per request per pass and consumed by the settler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject(RejectReason),
}

impl Decision {
    pub fn is_approve(&self) -> bool {
        matches!(self, Decision::Approve)
    }

    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            Decision::Approve => None,
            Decision::Reject(reason) => Some(reason),
        }
    }
}

impl From<Result<(), RejectReason>> for Decision {
    fn from(value: Result<(), RejectReason>) -> Self {
        match value {
            Ok(()) => Decision::Approve,
            Err(reason) => Decision::Reject(reason),
        }
    }
}

/// Why a request is rejected.
///
/// Amounts in the price-check reasons are in the common 18-decimal base,
/// holdings reasons are in the token's native decimals.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RejectReason {
    #[error("market closed")]
    MarketClosed,

    #[error("undercollateralized: provided {provided}, required at least {required}")]
    Undercollateralized { provided: U256, required: U256 },

    #[error("overclaimed: requested {requested}, allowed at most {allowed}")]
    Overclaimed { requested: U256, allowed: U256 },

    #[error("transfers too many destination tokens: source value {source_value}, destination value {dest_value}")]
    ExcessiveDestination { source_value: U256, dest_value: U256 },

    #[error("destination pool is not configured")]
    UnknownDestination,

    #[error("insufficient balance: has {balance}, needs {required}")]
    InsufficientBalance { balance: U256, required: U256 },

    #[error("insufficient allowance: has {allowance}, needs {required}")]
    InsufficientAllowance { allowance: U256, required: U256 },

    #[error("balance or allowance could not be queried")]
    ChainQueryFailed,
}
