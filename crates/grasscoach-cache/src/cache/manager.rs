//! The content cache manager and its lifecycle operations.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use futures::future::{join_all, try_join_all};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::CacheConfig;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::models::epoch::check_label;
use crate::models::{Asset, ContentRequest, Epoch, RequestIdentity};
use crate::store::{
    FileStore, SealRecord, StoreBackend, StoreError, StoreName, StoreResult,
};

use super::{InterceptError, PopulateError};

/// Maximum namespace length; the epoch and a separator are appended to it.
const MAX_NAMESPACE_LENGTH: usize = 64;

/// The three operations a host runtime drives, one per lifecycle event.
///
/// Each returns a future that must be awaited to completion before the host
/// treats the triggering event (install, fetch, activate) as finished.
#[async_trait]
pub trait LifecycleHandler: Send + Sync {
    /// Install: fetch every seed asset and write it into the epoch's store.
    async fn populate(
        &self,
        epoch: &Epoch,
        seed_set: &[RequestIdentity],
    ) -> Result<PopulateReport, PopulateError>;

    /// Fetch: answer from the current store, or from the network on a miss.
    async fn intercept(&self, request: &ContentRequest) -> Result<Asset, InterceptError>;

    /// Activate: make `epoch` current and delete every other store.
    async fn reclaim(&self, epoch: &Epoch) -> ReclaimReport;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Ready { epoch: Epoch },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulateReport {
    pub store: StoreName,
    pub entries: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclaimReport {
    pub deleted: Vec<StoreName>,
    pub failed: Vec<StoreName>,
}

impl ReclaimReport {
    pub fn reclaimed_count(&self) -> usize {
        self.deleted.len()
    }
}

/// One store as seen by `CacheManager::inventory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreSummary {
    pub name: StoreName,
    pub entries: usize,
    pub seal: Option<SealRecord>,
    pub current: bool,
}

/// Owns the per-epoch content stores for one namespace.
///
/// Populate and Reclaim are the only writers and run during install and
/// activation. Intercepts may run concurrently with each other and only read.
pub struct CacheManager {
    namespace: String,
    store: Arc<dyn StoreBackend>,
    fetcher: Arc<dyn Fetcher>,
    /// Relative identities are anchored here before any store access.
    origin: Option<Url>,
    state: RwLock<LifecycleState>,
}

impl CacheManager {
    pub fn new(
        namespace: impl Into<String>,
        store: Arc<dyn StoreBackend>,
        fetcher: Arc<dyn Fetcher>,
    ) -> StoreResult<Self> {
        let namespace = namespace.into();
        if let Err(reason) = check_label(&namespace, MAX_NAMESPACE_LENGTH) {
            return Err(StoreError::InvalidName {
                name: namespace,
                reason,
            });
        }

        Ok(Self {
            namespace,
            store,
            fetcher,
            origin: None,
            state: RwLock::new(LifecycleState::Uninitialized),
        })
    }

    /// Treat relative and absolute URLs under `origin` as the same asset.
    pub fn with_origin(mut self, origin: Option<Url>) -> Self {
        self.origin = origin;
        self
    }

    /// Build a manager backed by the on-disk store and the HTTP fetcher.
    pub fn from_config(config: &CacheConfig) -> anyhow::Result<Self> {
        let cache_dir = config.cache_dir()?;
        let store = FileStore::new(cache_dir.clone())
            .with_context(|| format!("Failed to open store directory {}", cache_dir.display()))?;
        let fetcher = HttpFetcher::new(config.origin.clone(), config.request_timeout())
            .context("Failed to build HTTP client")?;

        let manager = Self::new(config.namespace.clone(), Arc::new(store), Arc::new(fetcher))?
            .with_origin(config.origin.clone());
        Ok(manager)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn store_name(&self, epoch: &Epoch) -> StoreName {
        StoreName::for_epoch(&self.namespace, epoch)
    }

    pub async fn state(&self) -> LifecycleState {
        self.state.read().await.clone()
    }

    /// Store consulted by Intercept, if the manager is ready.
    pub async fn current_store(&self) -> Option<StoreName> {
        match &*self.state.read().await {
            LifecycleState::Ready { epoch } => Some(self.store_name(epoch)),
            LifecycleState::Uninitialized => None,
        }
    }

    /// Pick up a store sealed by an earlier process for `epoch`.
    ///
    /// Returns whether the manager is now ready. An unsealed or missing store
    /// leaves the state unchanged; Populate has to run again.
    pub async fn resume(&self, epoch: &Epoch) -> StoreResult<bool> {
        let store = self.store_name(epoch);
        match self.store.seal_record(&store).await? {
            Some(record) if record.epoch == *epoch => {
                info!(store = %store, entries = record.entries, "Resumed sealed content store");
                *self.state.write().await = LifecycleState::Ready {
                    epoch: epoch.clone(),
                };
                Ok(true)
            }
            Some(record) => {
                warn!(store = %store, sealed_epoch = %record.epoch, "Seal belongs to another epoch");
                Ok(false)
            }
            None => {
                debug!(store = %store, "No sealed store to resume");
                Ok(false)
            }
        }
    }

    /// Every store in this manager's namespace, with entry counts and seals.
    pub async fn inventory(&self) -> StoreResult<Vec<StoreSummary>> {
        let current = self.current_store().await;
        let mut summaries = Vec::new();

        for name in self.store.store_names().await? {
            if !name.belongs_to(&self.namespace) {
                continue;
            }
            summaries.push(StoreSummary {
                entries: self.store.identities(&name).await?.len(),
                seal: self.store.seal_record(&name).await?,
                current: current.as_ref() == Some(&name),
                name,
            });
        }

        Ok(summaries)
    }

    /// Anchor every seed to the origin and drop repeats, keeping first-seen order.
    fn distinct_seeds(&self, seed_set: &[RequestIdentity]) -> Vec<RequestIdentity> {
        let mut seen = HashSet::new();
        let mut seeds = Vec::with_capacity(seed_set.len());
        for identity in seed_set {
            let identity = identity.anchored(self.origin.as_ref());
            if seen.insert(identity.clone()) {
                seeds.push(identity);
            } else {
                warn!(identity = %identity, "Duplicate seed entry ignored");
            }
        }
        seeds
    }

    async fn fetch_seed(&self, identity: &RequestIdentity) -> Result<Asset, PopulateError> {
        let asset = self
            .fetcher
            .fetch(&ContentRequest::from(identity))
            .await
            .map_err(|source| PopulateError::Fetch {
                identity: identity.clone(),
                source,
            })?;

        if !asset.is_success() {
            return Err(PopulateError::from_status(identity.clone(), &asset));
        }
        Ok(asset)
    }

    async fn fill_store(
        &self,
        store: &StoreName,
        epoch: &Epoch,
        seeds: &[RequestIdentity],
    ) -> Result<PopulateReport, PopulateError> {
        self.store.open(store).await?;
        // A re-run must not leave an earlier seal vouching for a half-written store
        self.store.unseal(store).await?;

        // Nothing is written unless every seed fetched cleanly
        let assets = try_join_all(seeds.iter().map(|identity| self.fetch_seed(identity))).await?;

        let mut bytes = 0u64;
        for (identity, asset) in seeds.iter().zip(&assets) {
            self.store.put(store, identity, asset).await?;
            bytes += asset.len() as u64;
        }

        self.store
            .seal(store, &SealRecord::new(epoch.clone(), seeds.len()))
            .await?;

        Ok(PopulateReport {
            store: store.clone(),
            entries: seeds.len(),
            bytes,
        })
    }
}

#[async_trait]
impl LifecycleHandler for CacheManager {
    async fn populate(
        &self,
        epoch: &Epoch,
        seed_set: &[RequestIdentity],
    ) -> Result<PopulateReport, PopulateError> {
        let store = self.store_name(epoch);
        let seeds = self.distinct_seeds(seed_set);
        info!(store = %store, seeds = seeds.len(), "Populating content store");

        let result = self.fill_store(&store, epoch, &seeds).await;

        let mut state = self.state.write().await;
        let next = match (&result, &*state) {
            (Ok(_), LifecycleState::Uninitialized) => Some(LifecycleState::Ready {
                epoch: epoch.clone(),
            }),
            (Err(_), LifecycleState::Ready { epoch: current }) if current == epoch => {
                Some(LifecycleState::Uninitialized)
            }
            _ => None,
        };
        if let Some(next) = next {
            *state = next;
        }
        drop(state);

        match &result {
            Ok(report) => info!(
                store = %store,
                entries = report.entries,
                bytes = report.bytes,
                "Content store populated"
            ),
            Err(e) => warn!(store = %store, error = %e, "Populate failed"),
        }
        result
    }

    async fn intercept(&self, request: &ContentRequest) -> Result<Asset, InterceptError> {
        let identity = request.identity().anchored(self.origin.as_ref());
        let store = self
            .current_store()
            .await
            .ok_or(InterceptError::NotReady)?;

        match self.store.get(&store, &identity).await {
            Ok(Some(asset)) => {
                debug!(store = %store, identity = %identity, "Cache hit");
                return Ok(asset);
            }
            Ok(None) => debug!(store = %store, identity = %identity, "Cache miss"),
            Err(e) => warn!(
                store = %store,
                identity = %identity,
                error = %e,
                "Store lookup failed, falling back to network"
            ),
        }

        // Miss results are handed back as-is and never written to a store
        self.fetcher
            .fetch(request)
            .await
            .map_err(|source| InterceptError::Network { identity, source })
    }

    async fn reclaim(&self, epoch: &Epoch) -> ReclaimReport {
        let keep = self.store_name(epoch);
        let names = match self.store.store_names().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "Failed to enumerate content stores");
                Vec::new()
            }
        };

        let doomed: Vec<StoreName> = names
            .into_iter()
            .filter(|name| name.belongs_to(&self.namespace) && *name != keep)
            .collect();
        let results = join_all(doomed.iter().map(|name| self.store.delete(name))).await;

        let mut report = ReclaimReport::default();
        for (name, result) in doomed.into_iter().zip(results) {
            match result {
                Ok(true) => {
                    debug!(store = %name, "Deleted superseded store");
                    report.deleted.push(name);
                }
                Ok(false) => debug!(store = %name, "Store already gone"),
                Err(e) => {
                    warn!(store = %name, error = %e, "Failed to delete superseded store");
                    report.failed.push(name);
                }
            }
        }

        let next = match self.store.seal_record(&keep).await {
            Ok(Some(_)) => LifecycleState::Ready {
                epoch: epoch.clone(),
            },
            Ok(None) => {
                warn!(store = %keep, "Activated epoch has no completed store");
                LifecycleState::Uninitialized
            }
            Err(e) => {
                warn!(store = %keep, error = %e, "Failed to read seal for activated epoch");
                LifecycleState::Uninitialized
            }
        };
        *self.state.write().await = next;

        info!(
            store = %keep,
            reclaimed = report.reclaimed_count(),
            failed = report.failed.len(),
            "Reclaimed superseded stores"
        );
        report
    }
}

// ============================================================================
// Tests
// ============================================================================
