use std::time::Duration;

use audioscribe::application::ports::ResultCache;
use audioscribe::domain::JobId;
use audioscribe::infrastructure::cache::InMemoryResultCache;

#[tokio::test]
async fn given_stored_result_when_read_then_returns_it() {
    let cache = InMemoryResultCache::new(Duration::from_secs(60), 8);
    let id = JobId::new();

    cache.put(id, "transcript").await.unwrap();

    assert_eq!(cache.get(id).await.unwrap().as_deref(), Some("transcript"));
}

#[tokio::test]
async fn given_expired_entry_when_read_then_misses() {
    let cache = InMemoryResultCache::new(Duration::from_millis(20), 8);
    let id = JobId::new();
    cache.put(id, "short lived").await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(cache.get(id).await.unwrap().is_none());
}

#[tokio::test]
async fn given_full_cache_when_adding_then_size_stays_within_capacity() {
    let cache = InMemoryResultCache::new(Duration::from_secs(60), 2);
    let newest = JobId::new();

    cache.put(JobId::new(), "one").await.unwrap();
    cache.put(JobId::new(), "two").await.unwrap();
    cache.put(newest, "three").await.unwrap();

    assert_eq!(cache.len().await, 2);
    assert_eq!(cache.get(newest).await.unwrap().as_deref(), Some("three"));
}

#[tokio::test]
async fn given_entries_when_cleared_then_all_miss() {
    let cache = InMemoryResultCache::new(Duration::from_secs(60), 8);
    let id = JobId::new();
    cache.put(id, "gone soon").await.unwrap();

    cache.clear().await.unwrap();

    assert!(cache.get(id).await.unwrap().is_none());
    assert_eq!(cache.len().await, 0);
}
