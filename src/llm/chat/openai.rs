use async_trait::async_trait;
use log::{ debug, info };
use reqwest::{Client as HttpClient, header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION}};
use serde::{Deserialize, Serialize};

use super::{ BoxError, ChatClient, CompletionResponse, TokenStream, http_stream_generate, upstream_error };
use crate::llm::LlmConfig;
use crate::models::chat::ChatMessage;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIStreamResponse {
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIDelta,
}

#[derive(Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

fn parse_openai_line(line: &str) -> Option<String> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<OpenAIStreamResponse>(data) {
        Ok(stream_resp) => {
            let text: String = stream_resp.choices
                .into_iter()
                .filter_map(|choice| choice.delta.content)
                .collect();
            if text.is_empty() { None } else { Some(text) }
        }
        Err(e) => {
            debug!("JSON parse error: {} for data: {}", e, data);
            None
        }
    }
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, BoxError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| format!("Invalid API key format: {}", e))?
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Box::new(e) as BoxError)?;

        Ok(Self {
            http,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, BoxError> {
        let api_key = config.api_key
            .clone()
            .ok_or_else(|| "OpenAI API key is required".to_string())?;

        Self::new(api_key, config.completion_model.clone(), config.base_url.clone())
    }

    fn request(&self, messages: &[ChatMessage], stream: bool) -> OpenAIChatRequest {
        OpenAIChatRequest {
            model: self.model.clone(),
            messages: messages
                .iter()
                .map(|m| OpenAIMessage { role: m.role.to_string(), content: m.content.clone() })
                .collect(),
            temperature: 0.7,
            stream: if stream { Some(true) } else { None },
        }
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage]
    ) -> Result<CompletionResponse, BoxError> {
        info!("OpenAIChatClient::complete() → model={} messages={}", self.model, messages.len());

        let resp = self.http.post(self.url())
            .json(&self.request(messages, false))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(upstream_error("OpenAI", resp).await);
        }

        let body = resp.json::<OpenAIResponse>().await?;
        let content = body.choices
            .into_iter()
            .next()
            .ok_or_else(|| "No response from OpenAI API".to_string())?
            .message.content;

        Ok(CompletionResponse { response: content })
    }

    async fn stream_completion(
        &self,
        messages: &[ChatMessage]
    ) -> Result<TokenStream, BoxError> {
        info!("OpenAIChatClient::stream_completion() → model={}", self.model);
        let request = self.http.post(self.url()).json(&self.request(messages, true));
        http_stream_generate("OpenAI", request, parse_openai_line).await
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }
}
