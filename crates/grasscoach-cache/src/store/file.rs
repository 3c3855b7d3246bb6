//! Durable on-disk store backend.
//!
//! Layout under the root directory:
//!
//! ```text
//! <root>/<store-name>/<sha256>.meta   identity, status, headers, capture time
//! <root>/<store-name>/<sha256>.body   raw response body
//! <root>/<store-name>/sealed.json     present only once Populate completed
//! ```
//!
//! Every file is written to a temporary sibling and renamed into place. The
//! body is written before the meta file, so an entry only becomes visible
//! once both halves are on disk.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::models::asset::AssetHead;
use crate::models::{Asset, RequestIdentity};

use super::{SealRecord, StoreBackend, StoreError, StoreName, StoreResult};

/// Seal marker file name inside a store directory
const SEAL_FILE: &str = "sealed.json";

const META_EXTENSION: &str = "meta";
const BODY_EXTENSION: &str = "body";

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    identity: RequestIdentity,
    #[serde(flatten)]
    head: AssetHead,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> StoreResult<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn store_dir(&self, store: &StoreName) -> PathBuf {
        self.root.join(store.as_str())
    }

    fn entry_path(&self, store: &StoreName, identity: &RequestIdentity, extension: &str) -> PathBuf {
        self.store_dir(store)
            .join(format!("{}.{}", identity.file_stem(), extension))
    }

    fn seal_path(&self, store: &StoreName) -> PathBuf {
        self.store_dir(store).join(SEAL_FILE)
    }

    async fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
        let mut tmp: OsString = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, contents).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }

    /// Read a file, mapping "not found" to `None`.
    async fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn read_meta(path: &Path) -> StoreResult<Option<EntryMeta>> {
        let Some(bytes) = Self::read_optional(path).await? else {
            return Ok(None);
        };
        let meta = serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(meta))
    }
}

#[async_trait]
impl StoreBackend for FileStore {
    async fn store_names(&self) -> StoreResult<Vec<StoreName>> {
        let mut names = Vec::new();
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match StoreName::parse(name) {
                Ok(store) => names.push(store),
                Err(e) => debug!(error = %e, "Skipping foreign directory in store root"),
            }
        }

        names.sort();
        Ok(names)
    }

    async fn open(&self, store: &StoreName) -> StoreResult<()> {
        fs::create_dir_all(self.store_dir(store)).await?;
        Ok(())
    }

    async fn put(
        &self,
        store: &StoreName,
        identity: &RequestIdentity,
        asset: &Asset,
    ) -> StoreResult<()> {
        self.open(store).await?;

        let (head, body) = asset.clone().into_parts();
        let meta = EntryMeta {
            identity: identity.clone(),
            head,
        };
        let meta_path = self.entry_path(store, identity, META_EXTENSION);
        let meta_json = serde_json::to_vec_pretty(&meta).map_err(|source| StoreError::Corrupt {
            path: meta_path.clone(),
            source,
        })?;

        Self::write_atomic(&self.entry_path(store, identity, BODY_EXTENSION), &body).await?;
        Self::write_atomic(&meta_path, &meta_json).await?;
        Ok(())
    }

    async fn get(
        &self,
        store: &StoreName,
        identity: &RequestIdentity,
    ) -> StoreResult<Option<Asset>> {
        let meta_path = self.entry_path(store, identity, META_EXTENSION);
        let Some(meta) = Self::read_meta(&meta_path).await? else {
            return Ok(None);
        };

        // Hash collisions are not expected, but never serve the wrong asset
        if meta.identity != *identity {
            warn!(store = %store, identity = %identity, stored = %meta.identity, "Entry identity mismatch");
            return Ok(None);
        }

        let body_path = self.entry_path(store, identity, BODY_EXTENSION);
        let Some(body) = Self::read_optional(&body_path).await? else {
            warn!(path = ?body_path, "Cache entry has metadata but no body");
            return Ok(None);
        };
        if body.len() as u64 != meta.head.body_len {
            warn!(
                path = ?body_path,
                expected = meta.head.body_len,
                actual = body.len(),
                "Cache entry body length mismatch"
            );
            return Ok(None);
        }

        Ok(Some(Asset::from_parts(meta.head, body)))
    }

    async fn identities(&self, store: &StoreName) -> StoreResult<Vec<RequestIdentity>> {
        let mut identities = Vec::new();
        let mut dir = match fs::read_dir(self.store_dir(store)).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(identities),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(META_EXTENSION) {
                continue;
            }
            if let Some(meta) = Self::read_meta(&path).await? {
                identities.push(meta.identity);
            }
        }

        identities.sort();
        Ok(identities)
    }

    async fn seal(&self, store: &StoreName, record: &SealRecord) -> StoreResult<()> {
        self.open(store).await?;
        let path = self.seal_path(store);
        let json = serde_json::to_vec_pretty(record).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;
        Self::write_atomic(&path, &json).await?;
        Ok(())
    }

    async fn unseal(&self, store: &StoreName) -> StoreResult<()> {
        match fs::remove_file(self.seal_path(store)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn seal_record(&self, store: &StoreName) -> StoreResult<Option<SealRecord>> {
        let path = self.seal_path(store);
        let Some(bytes) = Self::read_optional(&path).await? else {
            return Ok(None);
        };
        let record = serde_json::from_slice(&bytes)
            .map_err(|source| StoreError::Corrupt { path, source })?;
        Ok(Some(record))
    }

    async fn delete(&self, store: &StoreName) -> StoreResult<bool> {
        match fs::remove_dir_all(self.store_dir(store)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
