//! Where the next user message comes from.
//!
//! Typed text and speech are one capability: something that eventually yields
//! a line of text. Speech goes through the remote transcription client and
//! then re-enters the conversation exactly like typed input.

use async_trait::async_trait;
use log::info;
use std::path::{ Path, PathBuf };
use std::sync::Arc;
use std::time::Duration;

use crate::llm::transcription::{ AudioClip, TranscriptionClient, TranscriptionError };

/// Upper bound on a single capture, so an acquisition always ends.
pub const MAX_CAPTURE: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("failed to read audio file '{path}': {source}")]
    Audio {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Transcription(#[from] TranscriptionError),
    #[error("audio capture did not finish within {0:?}")]
    TimedOut(Duration),
}

#[async_trait]
pub trait TextInput: Send + Sync {
    /// `Ok(None)` when the source produced nothing worth sending.
    async fn obtain_text(&self) -> Result<Option<String>, InputError>;
    fn describe(&self) -> &'static str;
}

pub struct TypedInput {
    text: String,
}

impl TypedInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl TextInput for TypedInput {
    async fn obtain_text(&self) -> Result<Option<String>, InputError> {
        let text = self.text.trim();
        Ok(if text.is_empty() { None } else { Some(text.to_string()) })
    }

    fn describe(&self) -> &'static str {
        "typed"
    }
}

pub struct TranscribedInput {
    path: PathBuf,
    transcriber: Arc<dyn TranscriptionClient>,
    limit: Duration,
}

impl TranscribedInput {
    pub fn new(path: impl Into<PathBuf>, transcriber: Arc<dyn TranscriptionClient>) -> Self {
        Self { path: path.into(), transcriber, limit: MAX_CAPTURE }
    }

    pub fn with_limit(mut self, limit: Duration) -> Self {
        self.limit = limit;
        self
    }
}

fn audio_mime(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let mime = match ext.as_str() {
        "webm" => "audio/webm",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" | "mp4" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "flac" => "audio/flac",
        _ => return None,
    };
    Some(mime.to_string())
}

#[async_trait]
impl TextInput for TranscribedInput {
    async fn obtain_text(&self) -> Result<Option<String>, InputError> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|source| InputError::Audio {
            path: self.path.display().to_string(),
            source,
        })?;
        let file_name = self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.webm".to_string());
        let clip = AudioClip::new(bytes, file_name, audio_mime(&self.path));

        info!(
            "Transcribing {} with {} [{}]",
            self.path.display(),
            self.transcriber.get_model(),
            self.transcriber.language()
        );
        let text = tokio::time::timeout(self.limit, self.transcriber.transcribe(clip))
            .await
            .map_err(|_| InputError::TimedOut(self.limit))??;

        let text = text.trim();
        Ok(if text.is_empty() { None } else { Some(text.to_string()) })
    }

    fn describe(&self) -> &'static str {
        "transcribed"
    }
}

/// Speech when an audio source and a transcriber are both available,
/// otherwise typed text, otherwise nothing.
pub fn select_input(
    typed: Option<String>,
    audio: Option<PathBuf>,
    transcriber: Option<Arc<dyn TranscriptionClient>>,
) -> Option<Box<dyn TextInput>> {
    match (audio, transcriber) {
        (Some(path), Some(transcriber)) => {
            Some(Box::new(TranscribedInput::new(path, transcriber)) as Box<dyn TextInput>)
        }
        _ => typed.map(|text| Box::new(TypedInput::new(text)) as Box<dyn TextInput>),
    }
}
