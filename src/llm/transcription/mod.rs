pub mod whisper;

use async_trait::async_trait;

pub use self::whisper::WhisperClient;

/// One uploaded audio file, as received from the client.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: Option<String>,
}

impl AudioClip {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>, content_type: Option<String>) -> Self {
        Self { bytes, file_name: file_name.into(), content_type }
    }
}

#[async_trait]
pub trait TranscriptionClient: Send + Sync {
    async fn transcribe(&self, clip: AudioClip) -> Result<String, TranscriptionError>;
    fn get_model(&self) -> String;
    fn language(&self) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    /// The provider answered with a non-success status.
    #[error("transcription provider returned {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}
