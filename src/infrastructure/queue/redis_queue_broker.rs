use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use futures::stream::BoxStream;
use redis::{AsyncCommands, Script};
use redis::aio::{ConnectionManager, MultiplexedConnection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::ports::{BrokerError, DeliveryToken, QueueBroker, QueueMessage};
use crate::domain::JobId;

/// Wire form of a queued job reference. The delivery id keeps every payload
/// unique so `LREM` settles exactly one entry.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    job_id: Uuid,
    delivery_id: Uuid,
}

/// Moves one payload from processing back to ready only if it is still there,
/// so a delivery settled concurrently is not duplicated.
const REQUEUE_SCRIPT: &str = r#"
local removed = redis.call('LREM', KEYS[1], 1, ARGV[1])
if removed == 1 then
    redis.call('LPUSH', KEYS[2], ARGV[1])
end
redis.call('HDEL', KEYS[3], ARGV[1])
return removed
"#;

/// Reliable-queue broker: consumers atomically move a payload from the ready
/// list into a processing list and remove it from there on ack.
///
/// Orphans are found with a lease hash keyed by payload. A payload first seen
/// in the processing list gets stamped; once the stamp is older than the
/// orphan threshold it is moved back to ready.
pub struct RedisQueueBroker {
    client: redis::Client,
    conn: ConnectionManager,
    ready_key: String,
    processing_key: String,
    leases_key: String,
    block_timeout: Duration,
    requeue_script: Script,
}

impl RedisQueueBroker {
    pub async fn connect(url: &str, queue_name: &str) -> Result<Self, BrokerError> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = ConnectionManager::new(client.clone())
            .await
            .map_err(map_redis_error)?;

        tracing::info!(queue = queue_name, "Connected to Redis queue");

        Ok(Self {
            client,
            conn,
            ready_key: format!("{}:ready", queue_name),
            processing_key: format!("{}:processing", queue_name),
            leases_key: format!("{}:leases", queue_name),
            block_timeout: Duration::from_secs(5),
            requeue_script: Script::new(REQUEUE_SCRIPT),
        })
    }

    pub fn ready_key(&self) -> &str {
        &self.ready_key
    }

    pub fn processing_key(&self) -> &str {
        &self.processing_key
    }

    /// Removes a payload that can never be decoded, so it does not sit in the
    /// processing list forever.
    async fn discard(&self, payload: &str) {
        let mut conn = self.conn.clone();
        let result: Result<(i64, i64), _> = redis::pipe()
            .atomic()
            .lrem(&self.processing_key, 1, payload)
            .hdel(&self.leases_key, payload)
            .query_async(&mut conn)
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to discard undecodable payload");
        }
    }

    async fn blocking_move(&self, conn: &mut MultiplexedConnection) -> Result<Option<String>, BrokerError> {
        redis::cmd("BLMOVE")
            .arg(&self.ready_key)
            .arg(&self.processing_key)
            .arg("RIGHT")
            .arg("LEFT")
            .arg(self.block_timeout.as_secs_f64())
            .query_async(conn)
            .await
            .map_err(map_redis_error)
    }
}

fn map_redis_error(e: redis::RedisError) -> BrokerError {
    BrokerError::Unavailable(e.to_string())
}

fn decode(payload: String) -> Result<QueueMessage, BrokerError> {
    let envelope: Envelope =
        serde_json::from_str(&payload).map_err(|e| BrokerError::Serialization(e.to_string()))?;
    Ok(QueueMessage {
        job_id: JobId::from_uuid(envelope.job_id),
        token: DeliveryToken(payload),
    })
}

#[async_trait]
impl QueueBroker for RedisQueueBroker {
    async fn publish(&self, job_id: JobId) -> Result<(), BrokerError> {
        let envelope = Envelope {
            job_id: job_id.as_uuid(),
            delivery_id: Uuid::new_v4(),
        };
        let payload =
            serde_json::to_string(&envelope).map_err(|e| BrokerError::Serialization(e.to_string()))?;

        let mut conn = self.conn.clone();
        let _: () = conn
            .lpush(&self.ready_key, payload)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    fn consume(&self) -> BoxStream<'_, Result<QueueMessage, BrokerError>> {
        futures::stream::unfold(None, move |conn: Option<MultiplexedConnection>| async move {
            let mut conn = match conn {
                Some(conn) => conn,
                None => match self.client.get_multiplexed_async_connection().await {
                    Ok(conn) => conn,
                    Err(e) => return Some((Err(map_redis_error(e)), None)),
                },
            };

            loop {
                match self.blocking_move(&mut conn).await {
                    Ok(Some(payload)) => match decode(payload.clone()) {
                        Ok(message) => return Some((Ok(message), Some(conn))),
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                payload = %payload,
                                "Dropping undecodable queue payload"
                            );
                            self.discard(&payload).await;
                        }
                    },
                    Ok(None) => continue,
                    Err(e) => return Some((Err(e), None)),
                }
            }
        })
        .boxed()
    }

    async fn ack(&self, message: &QueueMessage) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let (removed, _): (i64, i64) = redis::pipe()
            .atomic()
            .lrem(&self.processing_key, 1, &message.token.0)
            .hdel(&self.leases_key, &message.token.0)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        if removed == 0 {
            return Err(BrokerError::UnknownDelivery(message.job_id.to_string()));
        }
        Ok(())
    }

    async fn nack(&self, message: &QueueMessage) -> Result<(), BrokerError> {
        let mut conn = self.conn.clone();
        let removed: i64 = self
            .requeue_script
            .key(&self.processing_key)
            .key(&self.ready_key)
            .key(&self.leases_key)
            .arg(&message.token.0)
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        if removed == 0 {
            return Err(BrokerError::UnknownDelivery(message.job_id.to_string()));
        }
        Ok(())
    }

    async fn requeue_orphans(&self, older_than: Duration) -> Result<usize, BrokerError> {
        let mut conn = self.conn.clone();
        let now_ms = Utc::now().timestamp_millis();
        let threshold_ms = i64::try_from(older_than.as_millis()).unwrap_or(i64::MAX);

        let processing: Vec<String> = conn
            .lrange(&self.processing_key, 0, -1)
            .await
            .map_err(map_redis_error)?;
        let leases: HashMap<String, i64> = conn
            .hgetall(&self.leases_key)
            .await
            .map_err(map_redis_error)?;

        let mut moved = 0;
        for payload in &processing {
            match leases.get(payload) {
                None => {
                    let _: bool = conn
                        .hset_nx(&self.leases_key, payload, now_ms)
                        .await
                        .map_err(map_redis_error)?;
                }
                Some(seen_at) if now_ms.saturating_sub(*seen_at) >= threshold_ms => {
                    let removed: i64 = self
                        .requeue_script
                        .key(&self.processing_key)
                        .key(&self.ready_key)
                        .key(&self.leases_key)
                        .arg(payload)
                        .invoke_async(&mut conn)
                        .await
                        .map_err(map_redis_error)?;
                    if removed == 1 {
                        tracing::warn!(payload = %payload, "Requeued orphaned delivery");
                        moved += 1;
                    }
                }
                Some(_) => {}
            }
        }

        let live: HashSet<&String> = processing.iter().collect();
        let settled: Vec<&String> = leases.keys().filter(|p| !live.contains(p)).collect();
        if !settled.is_empty() {
            let _: i64 = conn
                .hdel(&self.leases_key, settled)
                .await
                .map_err(map_redis_error)?;
        }

        Ok(moved)
    }
}
