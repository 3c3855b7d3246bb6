//! Network fetching for the offline cache.
//!
//! The cache never talks to the network directly; it goes through the
//! `Fetcher` trait so the host can supply its own transport. `HttpFetcher`
//! is the reqwest-backed implementation used by the host binary.
//!
//! Fetchers perform exactly one request per call. Retry policy, if any,
//! belongs to the caller.

pub mod client;
pub mod error;

use async_trait::async_trait;

use crate::models::{Asset, ContentRequest};

pub use client::HttpFetcher;
pub use error::FetchError;

/// A single live network fetch.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request and capture the whole response.
    ///
    /// Non-success statuses are not errors here; they come back as an
    /// `Asset` carrying that status.
    async fn fetch(&self, request: &ContentRequest) -> Result<Asset, FetchError>;
}
