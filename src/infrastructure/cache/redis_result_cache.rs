use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::application::ports::{CacheError, ResultCache};
use crate::domain::JobId;

pub struct RedisResultCache {
    conn: ConnectionManager,
    prefix: String,
    ttl: Duration,
}

impl RedisResultCache {
    pub async fn connect(url: &str, prefix: &str, ttl: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;

        Ok(Self {
            conn,
            prefix: prefix.to_string(),
            ttl,
        })
    }

    fn key(&self, id: JobId) -> String {
        format!("{}:{}", self.prefix, id)
    }
}

fn map_redis_error(e: redis::RedisError) -> CacheError {
    CacheError::Unavailable(e.to_string())
}

#[async_trait]
impl ResultCache for RedisResultCache {
    async fn put(&self, id: JobId, result: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(self.key(id), result, self.ttl.as_secs().max(1))
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn get(&self, id: JobId) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        conn.get(self.key(id)).await.map_err(map_redis_error)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut scan_conn = self.conn.clone();
        let mut keys: Vec<String> = Vec::new();
        {
            let mut iter: redis::AsyncIter<String> = scan_conn
                .scan_match(format!("{}:*", self.prefix))
                .await
                .map_err(map_redis_error)?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        if keys.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let _: () = conn.del(keys).await.map_err(map_redis_error)?;
        Ok(())
    }
}
