use std::sync::{ Arc, Mutex };

use axum::body::{ to_bytes, Body };
use axum::http::{ header, Request, StatusCode };
use futures::StreamExt;
use serde_json::{ json, Value };
use tower::ServiceExt;

use moni::config::prompt::PromptConfig;
use moni::llm::chat::{ BoxError, ChatClient, CompletionResponse, TokenStream };
use moni::llm::transcription::{ AudioClip, TranscriptionClient, TranscriptionError };
use moni::models::chat::{ ChatMessage, Role };
use moni::server::create_router;
use moni::server::state::AppState;

const CAFE_REPLY: &str = r#"{"status":"success","message":"Đã ghi nhận","transaction":{"type":"expense","amount":25000,"description":"cafe","category":"Ăn uống","date":"15/12/2024"}}"#;
const BOUNDARY: &str = "moni-test-boundary";

struct MockChatClient {
    chunks: Vec<&'static str>,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockChatClient {
    fn new(chunks: Vec<&'static str>) -> Self {
        Self { chunks, seen: Mutex::new(Vec::new()) }
    }
}

#[async_trait::async_trait]
impl ChatClient for MockChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<CompletionResponse, BoxError> {
        self.seen.lock().unwrap().push(messages.to_vec());
        Ok(CompletionResponse { response: self.chunks.concat() })
    }

    async fn stream_completion(&self, messages: &[ChatMessage]) -> Result<TokenStream, BoxError> {
        self.seen.lock().unwrap().push(messages.to_vec());
        let items: Vec<Result<String, BoxError>> = self.chunks
            .iter()
            .map(|c| Ok(c.to_string()))
            .collect();
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn get_model(&self) -> String {
        "mock-chat".to_string()
    }
}

struct FailingChatClient;

#[async_trait::async_trait]
impl ChatClient for FailingChatClient {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<CompletionResponse, BoxError> {
        Err("gemini returned 503: overloaded".into())
    }

    fn get_model(&self) -> String {
        "failing".to_string()
    }
}

/// Streaming endpoint that fails before or after the first chunk.
struct BrokenStreamClient {
    fail_before_first_chunk: bool,
}

#[async_trait::async_trait]
impl ChatClient for BrokenStreamClient {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<CompletionResponse, BoxError> {
        Err("unused".into())
    }

    async fn stream_completion(&self, _messages: &[ChatMessage]) -> Result<TokenStream, BoxError> {
        if self.fail_before_first_chunk {
            return Err("Gemini API error 503 Service Unavailable: overloaded".into());
        }
        let items: Vec<Result<String, BoxError>> = vec![
            Ok("{\"status\":\"success\",".to_string()),
            Err("connection reset by peer".into())
        ];
        Ok(Box::pin(futures::stream::iter(items)))
    }

    fn get_model(&self) -> String {
        "broken".to_string()
    }
}

enum TranscriberBehavior {
    Text(&'static str),
    Upstream(u16, &'static str),
}

struct MockTranscriber {
    behavior: TranscriberBehavior,
    received: Mutex<Option<AudioClip>>,
}

impl MockTranscriber {
    fn new(behavior: TranscriberBehavior) -> Self {
        Self { behavior, received: Mutex::new(None) }
    }
}

#[async_trait::async_trait]
impl TranscriptionClient for MockTranscriber {
    async fn transcribe(&self, clip: AudioClip) -> Result<String, TranscriptionError> {
        *self.received.lock().unwrap() = Some(clip);
        match self.behavior {
            TranscriberBehavior::Text(text) => Ok(text.to_string()),
            TranscriberBehavior::Upstream(status, body) => {
                Err(TranscriptionError::Upstream { status, body: body.to_string() })
            }
        }
    }

    fn get_model(&self) -> String {
        "mock-whisper".to_string()
    }

    fn language(&self) -> String {
        "vi".to_string()
    }
}

fn state(
    chat_client: Option<Arc<dyn ChatClient>>,
    transcriber: Option<Arc<dyn TranscriptionClient>>,
    stream_responses: bool,
) -> AppState {
    AppState {
        chat_client,
        chat_credential: "GOOGLE_GENERATIVE_AI_API_KEY",
        transcriber,
        transcription_credential: "OPENAI_API_KEY",
        prompts: Arc::new(PromptConfig::default()),
        stream_responses,
    }
}

fn chat_request(messages: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "messages": messages }).to_string()))
        .unwrap()
}

fn multipart_request(field: &str, file_name: &str, payload: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field,
            file_name
        ).as_bytes()
    );
    body.extend_from_slice(b"Content-Type: audio/webm\r\n\r\n");
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/whisper")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
        .body(Body::from(body))
        .unwrap()
}

fn raw_json_request(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn chat_without_credential_is_500() {
    let app = create_router(state(None, None, true));

    let response = app.oneshot(chat_request(json!([{"role": "user", "content": "cafe 25k"}]))).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Missing GOOGLE_GENERATIVE_AI_API_KEY environment variable");
}

#[tokio::test]
async fn chat_streams_plain_text_with_system_prompt_first() {
    let (head, tail) = CAFE_REPLY.split_at(CAFE_REPLY.find("\"transaction\"").unwrap());
    let client = Arc::new(MockChatClient::new(vec![head, tail]));
    let app = create_router(state(Some(client.clone()), None, true));

    let response = app
        .oneshot(
            chat_request(
                json!([
                {"role": "user", "content": "xin chào"},
                {"role": "assistant", "content": "Chào bạn!"},
                {"role": "user", "content": "cafe 25k"}
            ])
            )
        ).await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(std::str::from_utf8(&bytes).unwrap(), CAFE_REPLY);

    let seen = client.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].len(), 4);
    assert_eq!(seen[0][0].role, Role::System);
    assert!(seen[0][0].content.contains("Moni"));
    assert_eq!(seen[0][3], ChatMessage::user("cafe 25k"));
}

#[tokio::test]
async fn buffered_chat_returns_text_data_and_view() {
    let client = Arc::new(MockChatClient::new(vec![CAFE_REPLY]));
    let app = create_router(state(Some(client), None, false));

    let response = app.oneshot(chat_request(json!([{"role": "user", "content": "cafe 25k"}]))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["text"], CAFE_REPLY);
    assert_eq!(body["data"]["transaction"]["amount"], 25000);
    assert_eq!(body["view"]["view"], "transaction_card");
    assert_eq!(body["view"]["card"]["amount"], "25.000đ");
}

#[tokio::test]
async fn chat_provider_failure_is_500() {
    let app = create_router(state(Some(Arc::new(FailingChatClient)), None, false));

    let response = app.oneshot(chat_request(json!([{"role": "user", "content": "cafe 25k"}]))).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Internal server error");
}

#[tokio::test]
async fn whisper_without_credential_is_500() {
    let app = create_router(state(None, None, true));

    let response = app.oneshot(multipart_request("audio", "clip.webm", b"RIFF")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Missing OPENAI_API_KEY environment variable");
}

#[tokio::test]
async fn whisper_without_audio_field_is_400() {
    let transcriber = Arc::new(MockTranscriber::new(TranscriberBehavior::Text("unused")));
    let app = create_router(state(None, Some(transcriber.clone()), true));

    let response = app.oneshot(multipart_request("file", "clip.webm", b"RIFF")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "No audio file provided");
    assert!(transcriber.received.lock().unwrap().is_none());
}

#[tokio::test]
async fn whisper_without_multipart_body_is_400() {
    let transcriber = Arc::new(MockTranscriber::new(TranscriberBehavior::Text("unused")));
    let app = create_router(state(None, Some(transcriber), true));

    let request = Request::builder()
        .method("POST")
        .uri("/api/whisper")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn whisper_returns_transcript() {
    let transcriber = Arc::new(MockTranscriber::new(TranscriberBehavior::Text("Minh vay tôi 500k")));
    let app = create_router(state(None, Some(transcriber.clone()), true));

    let response = app.oneshot(multipart_request("audio", "voice.webm", b"RIFF-audio")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body, json!({ "text": "Minh vay tôi 500k" }));

    let received = transcriber.received.lock().unwrap();
    let clip = received.as_ref().unwrap();
    assert_eq!(clip.file_name, "voice.webm");
    assert_eq!(clip.bytes, b"RIFF-audio".to_vec());
}

#[tokio::test]
async fn whisper_forwards_upstream_status() {
    let transcriber = Arc::new(
        MockTranscriber::new(TranscriberBehavior::Upstream(401, "{\"error\":\"invalid key\"}"))
    );
    let app = create_router(state(None, Some(transcriber), true));

    let response = app.oneshot(multipart_request("audio", "clip.webm", b"RIFF")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Transcription failed");
    assert_eq!(body["details"], "{\"error\":\"invalid key\"}");
}

#[tokio::test]
async fn interpret_classifies_partial_and_complete_text() {
    let app = create_router(state(None, None, true));
    let cut = CAFE_REPLY.find("\"transaction\"").unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/api/interpret")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "text": &CAFE_REPLY[..cut], "complete": false }).to_string()))
        .unwrap();
    let body = body_json(app.clone().oneshot(request).await.unwrap()).await;
    assert_eq!(body["interpretation"]["kind"], "incomplete");
    assert_eq!(body["view"]["view"], "pending");

    let fenced = format!("Đây là kết quả:\n```json\n{}\n```", CAFE_REPLY);
    let request = Request::builder()
        .method("POST")
        .uri("/api/interpret")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "text": fenced }).to_string()))
        .unwrap();
    let body = body_json(app.oneshot(request).await.unwrap()).await;
    assert_eq!(body["interpretation"]["kind"], "structured");
    assert_eq!(body["view"]["card"]["icon"], "💸");
}

#[tokio::test]
async fn health_reports_configured_providers() {
    let transcriber = Arc::new(MockTranscriber::new(TranscriberBehavior::Text("x")));
    let app = create_router(state(None, Some(transcriber), true));

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["chat_configured"], false);
    assert_eq!(body["transcription_configured"], true);
}

#[tokio::test]
async fn malformed_chat_body_is_400_json() {
    let client = Arc::new(MockChatClient::new(vec![CAFE_REPLY]));
    let app = create_router(state(Some(client.clone()), None, true));

    let response = app.oneshot(raw_json_request("/api/chat", "{not json")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("application/json"));
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid request body");
    assert!(body["details"].as_str().is_some());
    assert!(client.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_credential_wins_over_malformed_chat_body() {
    let app = create_router(state(None, None, true));

    let response = app.oneshot(raw_json_request("/api/chat", "{not json")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Missing GOOGLE_GENERATIVE_AI_API_KEY environment variable");
}

#[tokio::test]
async fn malformed_interpret_body_is_400_json() {
    let app = create_router(state(None, None, true));

    let response = app.oneshot(raw_json_request("/api/interpret", "{\"complete\": true}")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Invalid request body");
}

#[tokio::test]
async fn stream_failing_before_first_chunk_is_500_json() {
    let client = Arc::new(BrokenStreamClient { fail_before_first_chunk: true });
    let app = create_router(state(Some(client), None, true));

    let response = app.oneshot(chat_request(json!([{"role": "user", "content": "cafe 25k"}]))).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Internal server error");
    assert!(body["details"].as_str().unwrap().contains("503"));
}

#[tokio::test]
async fn stream_failing_midway_ends_the_body() {
    let client = Arc::new(BrokenStreamClient { fail_before_first_chunk: false });
    let app = create_router(state(Some(client), None, true));

    let response = app.oneshot(chat_request(json!([{"role": "user", "content": "cafe 25k"}]))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut chunks = response.into_body().into_data_stream();
    let first = chunks.next().await.unwrap().unwrap();
    assert_eq!(&first[..], b"{\"status\":\"success\",");
    assert!(chunks.next().await.unwrap().is_err());
}

#[tokio::test]
async fn whisper_with_empty_audio_is_400() {
    let transcriber = Arc::new(MockTranscriber::new(TranscriberBehavior::Text("unused")));
    let app = create_router(state(None, Some(transcriber.clone()), true));

    let response = app.oneshot(multipart_request("audio", "clip.webm", b"")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "No audio file provided");
    assert!(transcriber.received.lock().unwrap().is_none());
}
