use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use log::{ debug, info, warn };

use super::{ BoxError, ChatClient, CompletionResponse, TokenStream, http_stream_generate, upstream_error };
use crate::llm::LlmConfig;
use crate::models::chat::{ ChatMessage, Role };

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-05-20";
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
}

#[derive(Serialize, Debug)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Debug)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GoogleChunk {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    #[serde(default)]
    content: Option<GoogleContent>,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
struct GooglePart {
    #[serde(default)]
    text: Option<String>,
}

impl GoogleChunk {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

// System turns become `systemInstruction`; Gemini calls the assistant "model".
fn build_request(messages: &[ChatMessage]) -> GeminiRequest {
    let system_text = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let contents = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .map(|m| GeminiContent {
            role: Some(if m.role == Role::Assistant { "model" } else { "user" }),
            parts: vec![GeminiPart { text: m.content.clone() }],
        })
        .collect();

    GeminiRequest {
        system_instruction: if system_text.is_empty() {
            None
        } else {
            Some(GeminiContent { role: None, parts: vec![GeminiPart { text: system_text }] })
        },
        contents,
    }
}

fn parse_gemini_line(line: &str) -> Option<String> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<GoogleChunk>(data) {
        Ok(GoogleChunk { error: Some(error), .. }) => {
            warn!("Gemini reported an error mid-stream: {}", error);
            None
        }
        Ok(chunk) => Some(chunk.text()).filter(|text| !text.is_empty()),
        Err(e) => {
            debug!("JSON parse error: {} for data: {}", e, data);
            None
        }
    }
}

pub struct GeminiChatClient {
    http: HttpClient,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, BoxError> {
        let http = HttpClient::builder()
            .build()
            .map_err(|e| Box::new(e) as BoxError)?;

        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, BoxError> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| "Google API key is required for GeminiChatClient".to_string())?;

        Self::new(api_key, config.completion_model.clone(), config.base_url.clone())
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url.trim_end_matches('/'), self.model, method)
    }
}

#[async_trait]
impl ChatClient for GeminiChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage]
    ) -> Result<CompletionResponse, BoxError> {
        info!("GeminiChatClient::complete() → model={} messages={}", self.model, messages.len());

        let resp = self.http
            .post(self.endpoint("generateContent"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&build_request(messages))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(upstream_error("Gemini", resp).await);
        }

        let chunk = resp.json::<GoogleChunk>().await?;
        let text = chunk.text();
        if text.is_empty() {
            return Err("No response from Gemini API".into());
        }
        Ok(CompletionResponse { response: text })
    }

    async fn stream_completion(
        &self,
        messages: &[ChatMessage],
    ) -> Result<TokenStream, BoxError> {
        info!("GeminiChatClient::stream_completion() → model={} messages={}", self.model, messages.len());

        let request = self.http
            .post(format!("{}?alt=sse", self.endpoint("streamGenerateContent")))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&build_request(messages));

        http_stream_generate("Gemini", request, parse_gemini_line).await
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}
