use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::Notify;

use audioscribe::application::ports::{
    BrokerError, QueueBroker, QueueMessage, TranscriptionEngine, TranscriptionError,
};
use audioscribe::application::services::{
    RetryPolicy, Scheduler, SchedulerConfig, TranscriptionWorker, WorkerContext,
};
use audioscribe::domain::{InputRef, JobId, ModelName, WorkerId};
use audioscribe::infrastructure::cache::InMemoryResultCache;
use audioscribe::infrastructure::persistence::InMemoryJobStore;
use audioscribe::infrastructure::queue::InMemoryQueueBroker;
use audioscribe::infrastructure::storage::InMemoryStagingStore;

pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(60);
pub const PENDING_GRACE: Duration = Duration::from_secs(30);

/// Replays a fixed sequence of engine results.
pub struct ScriptedEngine {
    script: Mutex<VecDeque<Result<String, TranscriptionError>>>,
    calls: AtomicUsize,
    models: Mutex<Vec<Option<String>>>,
}

impl ScriptedEngine {
    pub fn new(script: Vec<Result<String, TranscriptionError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
            models: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Model override seen by each call, in order.
    pub fn models(&self) -> Vec<Option<String>> {
        self.models.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptionEngine for ScriptedEngine {
    async fn transcribe(
        &self,
        _audio_data: &[u8],
        model: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.models.lock().unwrap().push(model.map(str::to_string));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(TranscriptionError::TranscriptionFailed(
                    "script exhausted".to_string(),
                ))
            })
    }
}

/// Blocks inside `transcribe` until released, so tests can act mid-attempt.
#[derive(Default)]
pub struct GatedEngine {
    pub started: Notify,
    pub release: Notify,
}

#[async_trait]
impl TranscriptionEngine for GatedEngine {
    async fn transcribe(
        &self,
        _audio_data: &[u8],
        _model: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        self.started.notify_one();
        self.release.notified().await;
        Ok("gated transcript".to_string())
    }
}

/// In-memory broker whose publish can be switched off.
#[derive(Default)]
pub struct FlakyBroker {
    pub inner: InMemoryQueueBroker,
    down: AtomicBool,
}

impl FlakyBroker {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }
}

#[async_trait]
impl QueueBroker for FlakyBroker {
    async fn publish(&self, job_id: JobId) -> Result<(), BrokerError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable("connection refused".to_string()));
        }
        self.inner.publish(job_id).await
    }

    fn consume(&self) -> BoxStream<'_, Result<QueueMessage, BrokerError>> {
        self.inner.consume()
    }

    async fn ack(&self, message: &QueueMessage) -> Result<(), BrokerError> {
        self.inner.ack(message).await
    }

    async fn nack(&self, message: &QueueMessage) -> Result<(), BrokerError> {
        self.inner.nack(message).await
    }

    async fn requeue_orphans(&self, older_than: Duration) -> Result<usize, BrokerError> {
        self.inner.requeue_orphans(older_than).await
    }
}

/// One in-memory pipeline: store, broker, staging store, cache and scheduler.
pub struct Harness {
    pub store: Arc<InMemoryJobStore>,
    pub broker: Arc<FlakyBroker>,
    pub staging: Arc<InMemoryStagingStore>,
    pub cache: Arc<InMemoryResultCache>,
    pub scheduler: Arc<Scheduler>,
}

impl Harness {
    pub fn new(max_attempts: u32) -> Self {
        let store = Arc::new(InMemoryJobStore::new());
        let broker = Arc::new(FlakyBroker::default());
        let staging = Arc::new(InMemoryStagingStore::new());
        let cache = Arc::new(InMemoryResultCache::new(Duration::from_secs(60), 16));
        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            broker.clone(),
            Some(cache.clone()),
            SchedulerConfig {
                max_attempts,
                liveness_timeout: LIVENESS_TIMEOUT,
                pending_grace: PENDING_GRACE,
                retry: RetryPolicy::none(),
            },
        ));

        Self {
            store,
            broker,
            staging,
            cache,
            scheduler,
        }
    }

    pub fn context(&self, engine: Arc<dyn TranscriptionEngine>) -> WorkerContext {
        WorkerContext {
            job_store: self.store.clone(),
            broker: self.broker.clone(),
            staging_store: self.staging.clone(),
            transcription_engine: engine,
            result_cache: Some(self.cache.clone()),
            attempt_timeout: Duration::from_secs(5),
            requeue_backoff: Duration::ZERO,
            retry: RetryPolicy::none(),
        }
    }

    pub fn worker(&self, name: &str, engine: Arc<dyn TranscriptionEngine>) -> TranscriptionWorker {
        TranscriptionWorker::new(WorkerId::from_raw(name), self.context(engine))
    }

    /// Stages some audio and enqueues a job for it.
    pub async fn submit(&self) -> JobId {
        self.submit_with_model(None).await
    }

    pub async fn submit_with_model(&self, model: Option<ModelName>) -> JobId {
        let input_ref = InputRef::from_raw(format!("{}/sample.wav", uuid::Uuid::new_v4()));
        self.staging.insert(&input_ref, &b"RIFF....WAVEfmt "[..]).await;
        self.scheduler
            .enqueue(input_ref, model)
            .await
            .expect("enqueue should succeed")
    }

    pub async fn next_delivery(&self) -> QueueMessage {
        let mut deliveries = self.broker.consume();
        tokio::time::timeout(Duration::from_secs(1), deliveries.next())
            .await
            .expect("a delivery should be ready")
            .expect("consume never ends")
            .expect("in-memory consume never fails")
    }
}

pub fn transient() -> Result<String, TranscriptionError> {
    Err(TranscriptionError::ApiRequestFailed(
        "status 503: upstream overloaded".to_string(),
    ))
}
