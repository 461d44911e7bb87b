use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::application::ports::{BrokerError, DeliveryToken, QueueBroker, QueueMessage};
use crate::domain::JobId;

struct InFlight {
    job_id: JobId,
    delivered_at: Instant,
}

#[derive(Default)]
struct BrokerState {
    ready: VecDeque<JobId>,
    in_flight: HashMap<DeliveryToken, InFlight>,
    next_delivery: u64,
}

/// In-process broker. A delivery stays in flight until acked; a nack puts the
/// job id back at the tail of the ready queue.
#[derive(Default)]
pub struct InMemoryQueueBroker {
    state: Mutex<BrokerState>,
    notify: Notify,
}

impl InMemoryQueueBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ready_len(&self) -> usize {
        self.state.lock().await.ready.len()
    }

    pub async fn in_flight_len(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    async fn try_take(&self) -> Option<QueueMessage> {
        let mut state = self.state.lock().await;
        let job_id = state.ready.pop_front()?;
        state.next_delivery += 1;
        let token = DeliveryToken(format!("mem-{}", state.next_delivery));
        state.in_flight.insert(
            token.clone(),
            InFlight {
                job_id,
                delivered_at: Instant::now(),
            },
        );
        Some(QueueMessage { job_id, token })
    }

    async fn next_message(&self) -> QueueMessage {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.try_take().await {
                return message;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl QueueBroker for InMemoryQueueBroker {
    async fn publish(&self, job_id: JobId) -> Result<(), BrokerError> {
        self.state.lock().await.ready.push_back(job_id);
        self.notify.notify_one();
        Ok(())
    }

    fn consume(&self) -> BoxStream<'_, Result<QueueMessage, BrokerError>> {
        futures::stream::unfold(self, |broker| async move {
            let message = broker.next_message().await;
            Some((Ok(message), broker))
        })
        .boxed()
    }

    async fn ack(&self, message: &QueueMessage) -> Result<(), BrokerError> {
        self.state
            .lock()
            .await
            .in_flight
            .remove(&message.token)
            .map(|_| ())
            .ok_or_else(|| BrokerError::UnknownDelivery(message.token.0.clone()))
    }

    async fn nack(&self, message: &QueueMessage) -> Result<(), BrokerError> {
        {
            let mut state = self.state.lock().await;
            let delivery = state
                .in_flight
                .remove(&message.token)
                .ok_or_else(|| BrokerError::UnknownDelivery(message.token.0.clone()))?;
            state.ready.push_back(delivery.job_id);
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn requeue_orphans(&self, older_than: Duration) -> Result<usize, BrokerError> {
        let moved = {
            let mut state = self.state.lock().await;
            let expired: Vec<DeliveryToken> = state
                .in_flight
                .iter()
                .filter(|(_, delivery)| delivery.delivered_at.elapsed() >= older_than)
                .map(|(token, _)| token.clone())
                .collect();

            for token in &expired {
                if let Some(delivery) = state.in_flight.remove(token) {
                    state.ready.push_back(delivery.job_id);
                }
            }
            expired.len()
        };

        for _ in 0..moved {
            self.notify.notify_one();
        }
        Ok(moved)
    }
}
