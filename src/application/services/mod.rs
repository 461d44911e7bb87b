mod retry_policy;
mod scheduler;
mod transcription_worker;
mod worker_pool;

pub use retry_policy::{Retryable, RetryPolicy};
pub use scheduler::{ReconcileReport, Scheduler, SchedulerConfig, SchedulerError};
pub use transcription_worker::{Outcome, TranscriptionWorker, WorkerContext};
pub use worker_pool::{WorkerPool, WorkerPoolHandle};
