use std::time::Duration;

use async_trait::async_trait;

use crate::application::ports::{TranscriptionEngine, TranscriptionError};

/// Returns a canned transcript. Used in scaffold mode and local runs without
/// an API key.
pub struct MockTranscriptionEngine {
    transcript: String,
    delay: Duration,
}

impl MockTranscriptionEngine {
    pub fn new(transcript: impl Into<String>, delay: Duration) -> Self {
        Self {
            transcript: transcript.into(),
            delay,
        }
    }
}

impl Default for MockTranscriptionEngine {
    fn default() -> Self {
        Self::new("This is a mock transcription.", Duration::ZERO)
    }
}

#[async_trait]
impl TranscriptionEngine for MockTranscriptionEngine {
    async fn transcribe(
        &self,
        audio_data: &[u8],
        model: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        if audio_data.is_empty() {
            return Err(TranscriptionError::DecodingFailed(
                "empty audio payload".to_string(),
            ));
        }
        tracing::debug!(
            model = model.unwrap_or("default"),
            bytes = audio_data.len(),
            "Mock transcription"
        );
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.transcript.clone())
    }
}
