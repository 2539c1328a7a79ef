use thiserror::Error;

/// Result type alias for transport construction.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building a transport.
#[derive(Debug, Error)]
pub enum Error {
    /// No endpoint was configured.
    #[error("Endpoint is required")]
    MissingEndpoint,

    /// The endpoint is not a valid URL.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// The endpoint uses a scheme the transport cannot speak.
    #[error("Unsupported endpoint scheme: {0}")]
    UnsupportedScheme(String),

    /// The HTTP client could not be built.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
