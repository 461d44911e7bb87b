mod in_memory_queue_broker;
mod redis_queue_broker;

pub use in_memory_queue_broker::InMemoryQueueBroker;
pub use redis_queue_broker::RedisQueueBroker;
