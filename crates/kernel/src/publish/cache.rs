//! In-process cache of published versions.
//!
//! Versions never change once written, so entries are only evicted for
//! capacity, never invalidated.

use std::sync::Arc;

use moka::future::Cache;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::Version;
use crate::store::VersionStore;

/// Maximum number of cached versions.
const MAX_CAPACITY: u64 = 5_000;

#[derive(Clone)]
pub struct VersionCache {
    inner: Arc<VersionCacheInner>,
}

struct VersionCacheInner {
    local: Cache<(Uuid, i32), Arc<Version>>,
    store: Arc<dyn VersionStore>,
}

impl VersionCache {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self::with_capacity(store, MAX_CAPACITY)
    }

    pub fn with_capacity(store: Arc<dyn VersionStore>, capacity: u64) -> Self {
        let local = Cache::builder().max_capacity(capacity).build();
        Self {
            inner: Arc::new(VersionCacheInner { local, store }),
        }
    }

    /// Fetch a version, reading the store only on a miss.
    pub async fn get(&self, document_id: Uuid, version: i32) -> AppResult<Arc<Version>> {
        let key = (document_id, version);
        if let Some(hit) = self.inner.local.get(&key).await {
            debug!(document_id = %document_id, version, "version cache hit");
            return Ok(hit);
        }

        let loaded = Arc::new(self.inner.store.find(document_id, version).await?);
        self.inner.local.insert(key, loaded.clone()).await;
        Ok(loaded)
    }

    /// Seed the cache with a freshly appended version.
    pub async fn insert(&self, version: Version) {
        let key = (version.document_id, version.version);
        self.inner.local.insert(key, Arc::new(version)).await;
    }

    pub fn store(&self) -> &dyn VersionStore {
        self.inner.store.as_ref()
    }
}
