use std::time::Duration;

use futures::StreamExt;
use redis::AsyncCommands;

use audioscribe::application::ports::{BrokerError, QueueBroker, QueueMessage};
use audioscribe::domain::JobId;
use audioscribe::infrastructure::queue::RedisQueueBroker;

use crate::helpers::TestRedis;

async fn broker(redis: &TestRedis) -> RedisQueueBroker {
    let queue = format!("test:{}", uuid::Uuid::new_v4());
    RedisQueueBroker::connect(&redis.url, &queue)
        .await
        .expect("Failed to connect broker")
}

async fn receive(broker: &RedisQueueBroker) -> QueueMessage {
    let mut deliveries = broker.consume();
    tokio::time::timeout(Duration::from_secs(10), deliveries.next())
        .await
        .expect("delivery expected")
        .expect("consume never ends")
        .expect("delivery should decode")
}

async fn list_len(redis: &TestRedis, key: &str) -> usize {
    let mut conn = redis.connection().await;
    conn.llen(key).await.unwrap()
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_published_job_when_consumed_and_acked_then_processing_list_is_empty() {
    let redis = TestRedis::new().await;
    let broker = broker(&redis).await;
    let job_id = JobId::new();

    broker.publish(job_id).await.unwrap();
    let message = receive(&broker).await;

    assert_eq!(message.job_id, job_id);
    assert_eq!(list_len(&redis, broker.ready_key()).await, 0);
    assert_eq!(list_len(&redis, broker.processing_key()).await, 1);

    broker.ack(&message).await.unwrap();
    assert_eq!(list_len(&redis, broker.processing_key()).await, 0);
    assert!(matches!(
        broker.ack(&message).await,
        Err(BrokerError::UnknownDelivery(_))
    ));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_nacked_delivery_when_consuming_again_then_same_job_is_redelivered() {
    let redis = TestRedis::new().await;
    let broker = broker(&redis).await;
    let job_id = JobId::new();
    broker.publish(job_id).await.unwrap();
    let first = receive(&broker).await;

    broker.nack(&first).await.unwrap();
    let second = receive(&broker).await;

    assert_eq!(second.job_id, job_id);
    assert_eq!(list_len(&redis, broker.processing_key()).await, 1);
    assert!(matches!(
        broker.nack(&first).await,
        Err(BrokerError::UnknownDelivery(_))
    ));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_delivery_left_in_processing_when_requeuing_orphans_then_second_sweep_moves_it() {
    let redis = TestRedis::new().await;
    let broker = broker(&redis).await;
    let job_id = JobId::new();
    broker.publish(job_id).await.unwrap();
    let abandoned = receive(&broker).await;

    let first_sweep = broker.requeue_orphans(Duration::ZERO).await.unwrap();
    let second_sweep = broker.requeue_orphans(Duration::ZERO).await.unwrap();

    assert_eq!(first_sweep, 0, "first sweep only stamps the lease");
    assert_eq!(second_sweep, 1);
    assert_eq!(list_len(&redis, broker.processing_key()).await, 0);
    assert_eq!(list_len(&redis, broker.ready_key()).await, 1);
    assert!(broker.ack(&abandoned).await.is_err());
    assert_eq!(receive(&broker).await.job_id, job_id);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_recent_delivery_when_requeuing_orphans_then_it_is_left_alone() {
    let redis = TestRedis::new().await;
    let broker = broker(&redis).await;
    broker.publish(JobId::new()).await.unwrap();
    let message = receive(&broker).await;

    broker.requeue_orphans(Duration::from_secs(600)).await.unwrap();
    let moved = broker.requeue_orphans(Duration::from_secs(600)).await.unwrap();

    assert_eq!(moved, 0);
    broker.ack(&message).await.unwrap();
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_undecodable_payload_when_consuming_then_it_is_dropped_from_processing() {
    let redis = TestRedis::new().await;
    let broker = broker(&redis).await;
    let job_id = JobId::new();
    let mut conn = redis.connection().await;
    let _: () = conn.lpush(broker.ready_key(), "not json").await.unwrap();
    broker.publish(job_id).await.unwrap();

    let message = receive(&broker).await;

    assert_eq!(message.job_id, job_id);
    let processing: Vec<String> = conn.lrange(broker.processing_key(), 0, -1).await.unwrap();
    assert_eq!(processing, vec![message.token.0.clone()]);
}
