use std::time::Duration;

use serde::Deserialize;

/// `[scaffold]` runs the whole pipeline on in-memory adapters and the mock
/// engine, whatever the database, redis and transcription sections say.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ScaffoldSettings {
    pub enabled: bool,
    pub mock_delay_ms: u64,
}

impl ScaffoldSettings {
    /// Applies the short-form `SCAFFOLD_MODE` and `MOCK_RESPONSE_DELAY`
    /// variables on top of the file and `APP_SCAFFOLD__*` values.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(mode) = lookup("SCAFFOLD_MODE") {
            self.enabled = matches!(mode.trim().to_lowercase().as_str(), "true" | "1" | "yes");
        }
        if let Some(delay) = lookup("MOCK_RESPONSE_DELAY").and_then(|v| v.trim().parse().ok()) {
            self.mock_delay_ms = delay;
        }
        self
    }

    pub fn mock_delay(&self) -> Duration {
        Duration::from_millis(self.mock_delay_ms)
    }
}
