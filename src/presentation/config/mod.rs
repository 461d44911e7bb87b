mod environment;
mod scaffold_config;
mod settings;

pub use environment::Environment;
pub use scaffold_config::ScaffoldSettings;
pub use settings::{
    CacheSettings, DatabaseSettings, LoggingSettings, QueueSettings, ReconcilerSettings,
    RedisSettings, ServerSettings, Settings, StorageSettings, TranscriptionProviderSetting,
    TranscriptionSettings, WorkerSettings,
};
