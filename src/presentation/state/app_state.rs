use std::sync::Arc;

use crate::application::ports::StagingStore;
use crate::application::services::Scheduler;
use crate::presentation::config::Settings;

#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
    pub staging_store: Arc<dyn StagingStore>,
    pub settings: Settings,
}
