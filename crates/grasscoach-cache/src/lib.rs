//! Offline content cache for the Grass Coach application.
//!
//! Keeps the application shell available without a network connection:
//! a fixed seed set is fetched into a per-epoch content store at install
//! time, every resource request is answered from that store when possible,
//! and stores left over from earlier epochs are deleted on activation.
//!
//! The host runtime drives everything through [`LifecycleHandler`]; see
//! [`CacheManager`] for the implementation.

pub mod cache;
pub mod config;
pub mod fetch;
pub mod models;
pub mod store;
pub mod utils;

pub use cache::{
    CacheManager, InterceptError, LifecycleHandler, LifecycleState, PopulateError,
    PopulateReport, ReclaimReport, StoreSummary,
};
pub use config::CacheConfig;
pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use models::{Asset, ContentRequest, Epoch, RequestIdentity};
pub use store::{FileStore, MemoryStore, SealRecord, StoreBackend, StoreError, StoreName};
