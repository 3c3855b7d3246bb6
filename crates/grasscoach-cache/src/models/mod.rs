//! Data models for the offline content cache.
//!
//! This module contains the value types that flow through every cache
//! operation:
//! - `Epoch`: the deployment generation that names a content store
//! - `RequestIdentity` / `ContentRequest`: lookup keys and outgoing requests
//! - `Asset`: a captured response

pub mod asset;
pub mod epoch;
pub mod request;

pub use asset::Asset;
pub use epoch::{Epoch, InvalidEpoch};
pub use request::{ContentRequest, RequestIdentity};
