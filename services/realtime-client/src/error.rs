//! Client error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Only `ws://` and `wss://` endpoints are accepted
    #[error("invalid realtime endpoint: {0}")]
    InvalidUrl(String),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}
