use async_trait::async_trait;
use log::{ debug, info };
use reqwest::multipart;
use serde::Deserialize;

use super::{ AudioClip, TranscriptionClient, TranscriptionError };

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "whisper-1";
const DEFAULT_LANGUAGE: &str = "vi";

pub struct WhisperClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    language: String,
}

#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

impl WhisperClient {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: Option<String>,
        language: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            language: language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        }
    }

    fn url(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'))
    }

    fn form(&self, clip: AudioClip) -> Result<multipart::Form, TranscriptionError> {
        let mime = clip.content_type.unwrap_or_else(|| "application/octet-stream".to_string());
        let file_part = multipart::Part::bytes(clip.bytes)
            .file_name(clip.file_name)
            .mime_str(&mime)
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("mime: {}", e)))?;

        Ok(multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("language", self.language.clone()))
    }
}

#[async_trait]
impl TranscriptionClient for WhisperClient {
    async fn transcribe(&self, clip: AudioClip) -> Result<String, TranscriptionError> {
        debug!("Sending {} bytes ({}) to {} model={} language={}",
            clip.bytes.len(), clip.file_name, self.url(), self.model, self.language);

        let form = self.form(clip)?;
        let response = self.client
            .post(self.url())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TranscriptionError::Upstream { status, body });
        }

        let transcription = response
            .json::<WhisperResponse>()
            .await
            .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))?;

        info!("Whisper transcription completed: {} chars", transcription.text.len());
        Ok(transcription.text)
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn language(&self) -> String {
        self.language.clone()
    }
}
