//! Error types for the network layer.

use crate::response::PayloadError;

use thiserror::Error;

/// Result type alias for network operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Structural misuse reported synchronously by [`Network::execute`].
///
/// [`Network::execute`]: crate::Network::execute
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The request combines options that cannot be used together.
    #[error("Invalid usage: {0}")]
    InvalidUsage(String),

    /// The adapter cannot perform this kind of operation.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

/// Failure delivered through a response stream's `error` event.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransportError {
    /// The request could not be sent or no response arrived.
    #[error("Request failed: {0}")]
    Request(String),

    /// The server answered with a non-success status.
    #[error("HTTP status {status}: {body}")]
    Http {
        /// Response status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// The response could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The server rejected the operation.
    #[error("Operation failed with {} error(s)", .0.len())]
    Graphql(Vec<PayloadError>),

    /// The connection closed before the operation finished.
    #[error("Connection closed")]
    Closed,

    /// Any other failure raised by a caller-supplied function.
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
