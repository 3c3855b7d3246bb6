//! Offline content cache manager.
//!
//! This module provides the `CacheManager`, which keeps one content store per
//! deployed epoch and implements the three lifecycle operations:
//! - Populate (install): fetch the seed set into the epoch's store, all or nothing
//! - Intercept (fetch): serve from the current store, fall back to the network
//! - Reclaim (activate): delete every store that is not the current epoch's
//!
//! Misses are never written back. An asset that is not part of the seed set
//! only becomes available offline once a later epoch seeds it.

pub mod error;
pub mod manager;

pub use error::{InterceptError, PopulateError};
pub use manager::{
    CacheManager, LifecycleHandler, LifecycleState, PopulateReport, ReclaimReport, StoreSummary,
};
