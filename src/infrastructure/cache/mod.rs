mod in_memory_result_cache;
mod redis_result_cache;

pub use in_memory_result_cache::InMemoryResultCache;
pub use redis_result_cache::RedisResultCache;
