mod job_store;
mod job_store_error;
mod queue_broker;
mod result_cache;
mod staging_store;
mod transcription_engine;

pub use job_store::{JobListQuery, JobStore};
pub use job_store_error::JobStoreError;
pub use queue_broker::{BrokerError, DeliveryToken, QueueBroker, QueueMessage};
pub use result_cache::{CacheError, ResultCache};
pub use staging_store::{StagingStore, StagingStoreError};
pub use transcription_engine::{TranscriptionEngine, TranscriptionError};
