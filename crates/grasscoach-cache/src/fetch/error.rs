use thiserror::Error;

/// Why a single network fetch could not produce an asset.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Raised by `Fetcher` implementations that do not go through reqwest.
    #[error("Connection failed: {0}")]
    Transport(String),

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Invalid request header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },
}
