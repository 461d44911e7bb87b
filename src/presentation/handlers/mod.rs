mod error;
mod health;
mod jobs;
mod upload;

pub use error::ErrorResponse;
pub use health::health_handler;
pub use jobs::{
    JobListResponse, JobResponse, cancel_job_handler, create_job_handler, download_audio_handler,
    job_status_handler, list_jobs_handler, transcript_handler,
};
pub use upload::upload_handler;
