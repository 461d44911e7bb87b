use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart;

use crate::application::ports::{TranscriptionEngine, TranscriptionError};

pub struct OpenAiWhisperEngine {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiWhisperEngine {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.unwrap_or_else(|| "whisper-1".to_string()),
        }
    }
}

/// Rate limits, server faults and rejected credentials are worth another
/// attempt. Any other 4xx means the upload itself is bad.
fn classify_status(status: StatusCode, body: String) -> TranscriptionError {
    let detail = format!("status {}: {}", status, body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => TranscriptionError::ResourceExhausted(detail),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            TranscriptionError::Unauthorized(detail)
        }
        StatusCode::UNSUPPORTED_MEDIA_TYPE => TranscriptionError::UnsupportedFormat(detail),
        s if s.is_server_error() => TranscriptionError::ApiRequestFailed(detail),
        s if s.is_client_error() => TranscriptionError::DecodingFailed(detail),
        _ => TranscriptionError::TranscriptionFailed(detail),
    }
}

#[async_trait]
impl TranscriptionEngine for OpenAiWhisperEngine {
    async fn transcribe(
        &self,
        audio_data: &[u8],
        model: Option<&str>,
    ) -> Result<String, TranscriptionError> {
        let model = model.unwrap_or(&self.model);
        let url = format!("{}/audio/transcriptions", self.base_url);

        let file_part = multipart::Part::bytes(audio_data.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("mime: {}", e)))?;

        let form = multipart::Form::new()
            .text("model", model.to_string())
            .text("response_format", "text")
            .part("file", file_part);

        tracing::debug!(model = %model, bytes = audio_data.len(), "Sending audio to Whisper API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(classify_status(status, body));
        }

        let transcript = response
            .text()
            .await
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("body: {}", e)))?;

        tracing::info!(chars = transcript.len(), "Whisper transcription completed");

        Ok(transcript.trim().to_string())
    }
}
