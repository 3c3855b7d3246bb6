//! In-memory store backend.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::{Asset, RequestIdentity};

use super::{SealRecord, StoreBackend, StoreName, StoreResult};

#[derive(Debug, Default)]
struct Bucket {
    entries: BTreeMap<RequestIdentity, Asset>,
    seal: Option<SealRecord>,
}

/// Process-local backend. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: RwLock<HashMap<StoreName, Bucket>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StoreBackend for MemoryStore {
    async fn store_names(&self) -> StoreResult<Vec<StoreName>> {
        let mut names: Vec<StoreName> = self.buckets.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn open(&self, store: &StoreName) -> StoreResult<()> {
        self.buckets.write().await.entry(store.clone()).or_default();
        Ok(())
    }

    async fn put(
        &self,
        store: &StoreName,
        identity: &RequestIdentity,
        asset: &Asset,
    ) -> StoreResult<()> {
        self.buckets
            .write()
            .await
            .entry(store.clone())
            .or_default()
            .entries
            .insert(identity.clone(), asset.clone());
        Ok(())
    }

    async fn get(
        &self,
        store: &StoreName,
        identity: &RequestIdentity,
    ) -> StoreResult<Option<Asset>> {
        Ok(self
            .buckets
            .read()
            .await
            .get(store)
            .and_then(|bucket| bucket.entries.get(identity).cloned()))
    }

    async fn identities(&self, store: &StoreName) -> StoreResult<Vec<RequestIdentity>> {
        Ok(self
            .buckets
            .read()
            .await
            .get(store)
            .map(|bucket| bucket.entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn seal(&self, store: &StoreName, record: &SealRecord) -> StoreResult<()> {
        self.buckets
            .write()
            .await
            .entry(store.clone())
            .or_default()
            .seal = Some(record.clone());
        Ok(())
    }

    async fn unseal(&self, store: &StoreName) -> StoreResult<()> {
        if let Some(bucket) = self.buckets.write().await.get_mut(store) {
            bucket.seal = None;
        }
        Ok(())
    }

    async fn seal_record(&self, store: &StoreName) -> StoreResult<Option<SealRecord>> {
        Ok(self
            .buckets
            .read()
            .await
            .get(store)
            .and_then(|bucket| bucket.seal.clone()))
    }

    async fn delete(&self, store: &StoreName) -> StoreResult<bool> {
        Ok(self.buckets.write().await.remove(store).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Epoch;

    fn name(s: &str) -> StoreName {
        StoreName::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = MemoryStore::new();
        let id = RequestIdentity::get("/index.html");
        let asset = Asset::new(200, vec![], b"shell".to_vec());

        store.put(&name("ns@v1"), &id, &asset).await.unwrap();
        assert_eq!(store.get(&name("ns@v1"), &id).await.unwrap(), Some(asset));
        assert_eq!(store.get(&name("ns@v2"), &id).await.unwrap(), None);
        assert_eq!(store.identities(&name("ns@v1")).await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_seal_lifecycle() {
        let store = MemoryStore::new();
        let s = name("ns@v1");
        store.open(&s).await.unwrap();
        assert!(store.seal_record(&s).await.unwrap().is_none());

        let record = SealRecord::new(Epoch::parse("v1").unwrap(), 3);
        store.seal(&s, &record).await.unwrap();
        assert_eq!(store.seal_record(&s).await.unwrap(), Some(record));

        store.unseal(&s).await.unwrap();
        assert!(store.seal_record(&s).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_is_noop() {
        let store = MemoryStore::new();
        store.open(&name("ns@v1")).await.unwrap();
        assert!(store.delete(&name("ns@v1")).await.unwrap());
        assert!(!store.delete(&name("ns@v1")).await.unwrap());
        assert!(store.store_names().await.unwrap().is_empty());
    }
}
