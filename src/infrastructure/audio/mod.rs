mod mock_transcription_engine;
mod openai_whisper_engine;
mod transcription_engine_factory;

pub use mock_transcription_engine::MockTranscriptionEngine;
pub use openai_whisper_engine::OpenAiWhisperEngine;
pub use transcription_engine_factory::{TranscriptionEngineFactory, TranscriptionProvider};
