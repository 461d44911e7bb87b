use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use moka::policy::EvictionPolicy;

use crate::application::ports::{CacheError, ResultCache};
use crate::domain::JobId;

/// Bounded TTL cache. When full, the least recently used entry makes room.
pub struct InMemoryResultCache {
    entries: Cache<JobId, String>,
}

impl InMemoryResultCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity.max(1) as u64)
            .time_to_live(ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self { entries }
    }

    /// Entry count after pending evictions have been applied.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }
}

#[async_trait]
impl ResultCache for InMemoryResultCache {
    async fn put(&self, id: JobId, result: &str) -> Result<(), CacheError> {
        self.entries.insert(id, result.to_string()).await;
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(&id).await)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.invalidate_all();
        Ok(())
    }
}
