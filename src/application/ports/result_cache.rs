use async_trait::async_trait;

use crate::domain::JobId;

/// Fast path for finished transcripts. Entries may vanish at any time; the job
/// store stays authoritative.
#[async_trait]
pub trait ResultCache: Send + Sync {
    async fn put(&self, id: JobId, result: &str) -> Result<(), CacheError>;

    async fn get(&self, id: JobId) -> Result<Option<String>, CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}
