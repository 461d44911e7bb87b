use async_trait::async_trait;

#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    /// `model` overrides the engine's configured default for this call.
    async fn transcribe(
        &self,
        audio_data: &[u8],
        model: Option<&str>,
    ) -> Result<String, TranscriptionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("audio decoding failed: {0}")]
    DecodingFailed(String),
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("input not found: {0}")]
    InputNotFound(String),
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
    /// Credentials were rejected; a configuration fault, not bad input.
    #[error("engine rejected credentials: {0}")]
    Unauthorized(String),
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("attempt timed out after {0}s")]
    Timeout(u64),
}

impl TranscriptionError {
    /// Corrupt or missing input never gets better on retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            TranscriptionError::DecodingFailed(_)
                | TranscriptionError::UnsupportedFormat(_)
                | TranscriptionError::InputNotFound(_)
        )
    }
}
