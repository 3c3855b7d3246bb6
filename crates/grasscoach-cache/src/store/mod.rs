//! Content stores: named, per-epoch mappings from request identity to asset.
//!
//! A backend holds any number of stores side by side. Each store is created
//! and filled during Populate for its epoch, read during Intercept and
//! removed as a whole during Reclaim. A store only counts as complete once a
//! `SealRecord` has been written for it.
//!
//! Backends:
//! - `FileStore`: durable, one directory per store
//! - `MemoryStore`: process-local, for tests and ephemeral hosts

pub mod file;
pub mod memory;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::epoch::check_label;
use crate::models::{Asset, Epoch, RequestIdentity};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Maximum length of either half of a store name.
const MAX_STORE_LABEL_LENGTH: usize = 64;

/// Joins namespace and epoch. Never valid inside either label.
const STORE_NAME_SEPARATOR: char = '@';

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt store entry at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid store name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Name of one content store, derived deterministically from namespace and epoch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreName(String);

impl StoreName {
    /// `<namespace>@<epoch>`, e.g. `grass-coach@v1`.
    pub fn for_epoch(namespace: &str, epoch: &Epoch) -> Self {
        Self(format!("{}{}{}", namespace, STORE_NAME_SEPARATOR, epoch))
    }

    pub fn parse(name: impl Into<String>) -> StoreResult<Self> {
        let name = name.into();
        let checked = match name.split_once(STORE_NAME_SEPARATOR) {
            Some((namespace, epoch)) => check_label(namespace, MAX_STORE_LABEL_LENGTH)
                .and_then(|()| check_label(epoch, MAX_STORE_LABEL_LENGTH)),
            None => Err("missing namespace separator"),
        };
        match checked {
            Ok(()) => Ok(Self(name)),
            Err(reason) => Err(StoreError::InvalidName { name, reason }),
        }
    }

    pub fn namespace(&self) -> &str {
        self.halves().0
    }

    pub fn epoch(&self) -> &str {
        self.halves().1
    }

    /// Whether this store was named under exactly `namespace`.
    pub fn belongs_to(&self, namespace: &str) -> bool {
        self.namespace() == namespace
    }

    fn halves(&self) -> (&str, &str) {
        // Both constructors guarantee the separator is present
        self.0
            .split_once(STORE_NAME_SEPARATOR)
            .unwrap_or((self.0.as_str(), ""))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Completion marker written after the last seed asset of a Populate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealRecord {
    pub epoch: Epoch,
    pub entries: usize,
    pub sealed_at: DateTime<Utc>,
}

impl SealRecord {
    pub fn new(epoch: Epoch, entries: usize) -> Self {
        Self {
            epoch,
            entries,
            sealed_at: Utc::now(),
        }
    }
}

/// Storage for content stores.
///
/// Writes only happen through `open`, `put`, `seal`, `unseal` and `delete`,
/// which the cache manager calls during Populate and Reclaim. Intercept uses
/// `get` alone.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Names of every store currently held.
    async fn store_names(&self) -> StoreResult<Vec<StoreName>>;

    /// Create the store if it does not exist yet.
    async fn open(&self, store: &StoreName) -> StoreResult<()>;

    /// Write (or overwrite) one entry. Creates the store if needed.
    async fn put(&self, store: &StoreName, identity: &RequestIdentity, asset: &Asset)
        -> StoreResult<()>;

    /// Look up one entry. A missing store is a miss, not an error.
    async fn get(&self, store: &StoreName, identity: &RequestIdentity)
        -> StoreResult<Option<Asset>>;

    /// Identities of every entry in the store, sorted.
    async fn identities(&self, store: &StoreName) -> StoreResult<Vec<RequestIdentity>>;

    /// Mark the store complete.
    async fn seal(&self, store: &StoreName, record: &SealRecord) -> StoreResult<()>;

    /// Withdraw the completion marker, if any.
    async fn unseal(&self, store: &StoreName) -> StoreResult<()>;

    async fn seal_record(&self, store: &StoreName) -> StoreResult<Option<SealRecord>>;

    /// Delete the whole store. Returns `false` if it did not exist.
    async fn delete(&self, store: &StoreName) -> StoreResult<bool>;
}
