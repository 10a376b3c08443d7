pub mod openai;
pub mod gemini;

use async_trait::async_trait;
use futures::{ Stream, StreamExt, Future };
use serde::Deserialize;
use std::error::Error as StdError;
use std::pin::Pin;
use std::sync::Arc;
use super::{ LlmConfig, LlmType };
use self::openai::OpenAIChatClient;
use self::gemini::GeminiChatClient;
use crate::models::chat::ChatMessage;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use log::warn;
use reqwest;

pub type BoxError = Box<dyn StdError + Send + Sync>;
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, BoxError>> + Send>>;

#[derive(Deserialize, Debug, Clone)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage]
    ) -> Result<CompletionResponse, BoxError>;

    /// Incremental text of the reply. Providers without a native streaming
    /// endpoint deliver the whole reply as a single chunk.
    async fn stream_completion(
        &self,
        messages: &[ChatMessage],
    ) -> Result<TokenStream, BoxError> {
        let response = self.complete(messages).await?.response;
        full_response_as_stream(move || async move { Ok(response) })
    }

    fn get_model(&self) -> String;
}

pub fn create_streaming_response<F, Fut>(
    response_fn: F
) -> Result<TokenStream, BoxError>
where
    F: FnOnce(mpsc::Sender<Result<String, BoxError>>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Ok(Box::pin(ReceiverStream::new(rx)))
}

pub fn full_response_as_stream<F, Fut>(
    response_fn: F
) -> Result<TokenStream, BoxError>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<String, BoxError>> + Send + 'static,
{
    create_streaming_response(move |tx| async move {
        match response_fn().await {
            Ok(response) => {
                let _ = tx.send(Ok(response)).await;
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
            }
        }
    })
}

pub fn new_client(
    config: &LlmConfig
) -> Result<Arc<dyn ChatClient>, BoxError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Gemini => {
            let specific_client = GeminiChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

/// Error text for a non-2xx upstream reply, including whatever body it sent.
pub async fn upstream_error(provider: &str, resp: reqwest::Response) -> BoxError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    format!("{} API error {}: {}", provider, status, body).into()
}

/// Splits complete lines off the front of `buffer`, leaving any trailing
/// partial line for the next network chunk.
pub fn drain_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
        let raw: Vec<u8> = buffer.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&raw);
        lines.push(line.trim_end_matches(['\r', '\n']).to_string());
    }
    lines
}

/// POSTs `payload` and turns the line-oriented reply into a token stream.
///
/// Connection failures and non-2xx replies are returned as `Err` before any
/// token is produced; errors after that arrive through the stream.
pub async fn http_stream_generate(
    provider: &'static str,
    request: reqwest::RequestBuilder,
    line_parser: fn(&str) -> Option<String>,
) -> Result<TokenStream, BoxError> {
    let resp = request.send().await?;
    if !resp.status().is_success() {
        return Err(upstream_error(provider, resp).await);
    }

    create_streaming_response(move |tx| async move {
        let mut bytes = resp.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(buf) => {
                    buffer.extend_from_slice(&buf);
                    for line in drain_lines(&mut buffer) {
                        if let Some(tok) = line_parser(&line) {
                            if tx.send(Ok(tok)).await.is_err() {
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!("{} stream interrupted: {}", provider, e);
                    let _ = tx.send(Err(Box::new(e) as _)).await;
                    return;
                }
            }
        }
        if !buffer.is_empty() {
            let line = String::from_utf8_lossy(&buffer).to_string();
            if let Some(tok) = line_parser(line.trim_end()) {
                let _ = tx.send(Ok(tok)).await;
            }
        }
    })
}
