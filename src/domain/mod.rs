mod input_ref;
mod job;
mod job_id;
mod job_state;
mod model_name;
mod worker_id;

pub use input_ref::InputRef;
pub use job::{ClaimUpdate, Job, TransitionFields, TransitionRejection};
pub use job_id::JobId;
pub use job_state::JobState;
pub use model_name::ModelName;
pub use worker_id::WorkerId;
