use std::fmt::Display;

use alloy::transports;

/// Error returned by the chain client as a result of a view call or
/// transaction submission.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("fatal error: {0}")]
    Fatal(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unexpected empty RPC response")]
    NullResp,

    #[error("transaction ran out of gas")]
    OutOfGas,

    #[error("transaction reverted: {0}")]
    Reverted(String),

    #[error("block not found: {0}")]
    BlockNotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("transaction timed out")]
    Timeout,
}

impl<E: Display> From<transports::RpcError<E>> for ChainError {
    fn from(value: transports::RpcError<E>) -> Self {
        match value {
            transports::RpcError::ErrorResp(ref resp) => {
                // Heuristic to determine if eth_call failed due to OutOfGas or
                // if transaction was reverted during the gas estimation
                let msg = resp.message.to_ascii_lowercase();
                if msg.contains("block not found")
                    || msg.contains("blocknotfound")
                    || msg.contains("header not found")
                {
                    Self::BlockNotFound(msg)
                } else if (resp.code == -32603) && (msg.contains("gas") || msg.contains("oog")) {
                    Self::OutOfGas
                } else if (resp.code == -32600 || resp.code == -32601 || resp.code == -32602)
                    && (msg.contains("invalid") || msg.contains("not found"))
                {
                    Self::InvalidRequest(msg)
                } else if resp.code == 3 || msg.contains("reverted") {
                    Self::Reverted(msg)
                } else {
                    Self::Transport(value.to_string())
                }
            }
            transports::RpcError::NullResp => Self::NullResp,
            _ => Self::Transport(value.to_string()),
        }
    }
}

impl From<alloy_sol_types::Error> for ChainError {
    fn from(value: alloy_sol_types::Error) -> Self {
        Self::Fatal(value.to_string())
    }
}

/// Failure to obtain a quote from the price feed.
///
/// Distinct from a closed market, which is a regular "no price" answer.
#[derive(Debug, thiserror::Error)]
pub enum PriceFeedError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected http status: {0}")]
    Status(u16),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("malformed price message: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid price value: {0}")]
    InvalidPrice(String),

    #[error("invalid feed url: {0}")]
    Url(#[from] url::ParseError),
}
