use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::JobId;

/// Opaque token identifying one delivery of a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeliveryToken(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub job_id: JobId,
    pub token: DeliveryToken,
}

/// At-least-once channel of job references. Ordering is FIFO-ish only;
/// consumers must tolerate duplicates and redeliveries.
#[async_trait]
pub trait QueueBroker: Send + Sync {
    async fn publish(&self, job_id: JobId) -> Result<(), BrokerError>;

    /// Never ends on its own. Each item is one delivery awaiting `ack` or `nack`.
    fn consume(&self) -> BoxStream<'_, Result<QueueMessage, BrokerError>>;

    async fn ack(&self, message: &QueueMessage) -> Result<(), BrokerError>;

    async fn nack(&self, message: &QueueMessage) -> Result<(), BrokerError>;

    /// Puts deliveries that stayed unsettled for at least `older_than` back on
    /// the ready queue and returns how many moved. Covers consumers that died
    /// or dropped a delivery mid-flight.
    async fn requeue_orphans(&self, older_than: Duration) -> Result<usize, BrokerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),
    #[error("message serialization failed: {0}")]
    Serialization(String),
    #[error("unknown delivery: {0}")]
    UnknownDelivery(String),
}

impl BrokerError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, BrokerError::Unavailable(_))
    }
}
