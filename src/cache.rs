//! Short-TTL read cache for the current store.
//!
//! Entries expire after the configured TTL and must be invalidated on every
//! store write.

use std::future::Future;
use std::time::Duration;

use moka::future::Cache;

use crate::domain::aggregates::Store;
use crate::domain::value_objects::StoreId;
use crate::Result;

pub const DEFAULT_STORE_TTL: Duration = Duration::from_secs(120);

const MAX_ENTRIES: u64 = 10_000;

#[derive(Clone)]
pub struct StoreCache {
    inner: Cache<StoreId, Store>,
}

impl StoreCache {
    pub fn new(ttl: Duration) -> Self {
        let inner = Cache::builder().max_capacity(MAX_ENTRIES).time_to_live(ttl).build();
        Self { inner }
    }

    pub async fn get(&self, id: StoreId) -> Option<Store> { self.inner.get(&id).await }

    pub async fn get_or_load<F, Fut>(&self, id: StoreId, load: F) -> Result<Store>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Store>>,
    {
        if let Some(store) = self.get(id).await {
            return Ok(store);
        }
        let store = load().await?;
        self.inner.insert(id, store.clone()).await;
        Ok(store)
    }

    pub async fn invalidate(&self, id: StoreId) { self.inner.invalidate(&id).await; }
}

impl Default for StoreCache {
    fn default() -> Self { Self::new(DEFAULT_STORE_TTL) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_loads_once_until_invalidated() {
        let cache = StoreCache::default();
        let store = Store::create("Acme");
        let id = store.id;
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let loaded = cache.get_or_load(id, || async { loads.fetch_add(1, Ordering::SeqCst); Ok(store.clone()) }).await.unwrap();
            assert_eq!(loaded.id, id);
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        cache.invalidate(id).await;
        assert!(cache.get(id).await.is_none());
        cache.get_or_load(id, || async { loads.fetch_add(1, Ordering::SeqCst); Ok(store.clone()) }).await.unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = StoreCache::new(Duration::from_millis(20));
        let store = Store::create("Acme");
        cache.get_or_load(store.id, || async { Ok(store.clone()) }).await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get(store.id).await.is_none());
    }

    #[tokio::test]
    async fn test_load_errors_are_not_cached() {
        let cache = StoreCache::default();
        let id = StoreId::new();
        let result = cache.get_or_load(id, || async { Err(Error::StoreNotFound) }).await;
        assert!(matches!(result, Err(Error::StoreNotFound)));
        assert!(cache.get(id).await.is_none());
    }
}
