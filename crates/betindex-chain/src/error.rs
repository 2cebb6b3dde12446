//! Chain-side error types.

use thiserror::Error;

/// Errors from the RPC transport, the event subscription, or ABI decoding.
#[derive(Debug, Error)]
pub enum ChainError {
    /// HTTP request failed (connection refused, timeout, bad status).
    #[error("HTTP error: {0}")]
    Http(String),

    /// WebSocket connect/send/receive error.
    #[error("WebSocket error: {0}")]
    Ws(String),

    /// JSON-RPC error returned by the node.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The subscription stream ended (server close or clean EOF).
    #[error("subscription closed")]
    SubscriptionClosed,

    /// Return data or log payload did not decode as the expected type.
    #[error("ABI decode error: {0}")]
    Decode(String),
}

impl ChainError {
    /// Returns `true` for transient conditions recovered by resubscribing
    /// or re-issuing the call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Ws(_) | Self::SubscriptionClosed
        )
    }
}
