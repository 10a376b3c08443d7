use std::error::Error;
use std::net::SocketAddr;
use axum::{
    body::Body,
    extract::{ DefaultBodyLimit, Multipart, State },
    extract::multipart::MultipartRejection,
    extract::rejection::JsonRejection,
    http::{ header, StatusCode },
    response::{ IntoResponse, Response },
    routing::{ get, post },
    Json,
    Router,
};
use futures::StreamExt;
use serde::{ Deserialize, Serialize };
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error, warn };
use uuid::Uuid;

use super::error::ApiError;
use super::state::AppState;
use crate::cli::Args;
use crate::interpreter::{ interpret, Interpretation };
use crate::llm::transcription::{ AudioClip, TranscriptionError };
use crate::models::chat::ChatRequest;
use crate::models::transaction::TransactionData;
use crate::presentation::{ render, MessageView };

/// Whisper's own upload ceiling.
const MAX_AUDIO_BYTES: usize = 25 * 1024 * 1024;
const AUDIO_FIELD: &str = "audio";

#[derive(Serialize, Debug)]
pub struct ChatReply {
    pub text: String,
    pub data: Option<TransactionData>,
    pub view: MessageView,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TranscriptReply {
    pub text: String,
}

#[derive(Deserialize, Debug)]
pub struct InterpretRequest {
    pub text: String,
    /// Whether the text is the finished reply rather than a stream prefix.
    #[serde(default = "default_complete")]
    pub complete: bool,
}

fn default_complete() -> bool {
    true
}

#[derive(Serialize, Debug)]
pub struct InterpretReply {
    pub interpretation: Interpretation,
    pub view: MessageView,
}

#[derive(Serialize, Debug)]
struct HealthReply {
    status: &'static str,
    chat_configured: bool,
    transcription_configured: bool,
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/whisper", post(whisper_handler))
        .route("/api/interpret", post(interpret_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_AUDIO_BYTES))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    state: AppState,
    args: &Args,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = args.server_addr.parse::<SocketAddr>()?;
    let app = create_router(state);

    if args.enable_tls {
        let (cert_path, key_path) = match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert), Some(key)) => (cert, key),
            _ => {
                error!("--enable-tls requires both --tls-cert-path and --tls-key-path.");
                return Err("TLS enabled without cert/key".into());
            }
        };
        // rustls needs a process-wide crypto provider before loading the config.
        let _ = rustls::crypto::ring::default_provider().install_default();
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            cert_path,
            key_path
        ).await?;

        info!("Starting HTTPS server on: https://{}", addr);
        axum_server::bind_rustls(addr, tls_config)
            .serve(app.into_make_service())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
            e
        })?;
        info!("Starting HTTP server on: http://{}", addr);
        axum::serve(listener, app.into_make_service()).await?;
    }

    Ok(())
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        warn!("Rejected request body: {}", rejection.body_text());
        ApiError::InvalidBody(rejection.body_text())
    })
}

async fn chat_handler(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let client = state.chat_client
        .clone()
        .ok_or(ApiError::MissingCredential(state.chat_credential))?;
    let req = json_body(body)?;

    let request_id = Uuid::new_v4();
    let messages = state.prompts.with_history(&req.messages);
    info!(
        "[{}] chat request: {} history messages, model={}, stream={}",
        request_id,
        req.messages.len(),
        client.get_model(),
        state.stream_responses
    );

    if state.stream_responses {
        let tokens = client.stream_completion(&messages).await.map_err(|e| {
            error!("[{}] completion stream failed to start: {}", request_id, e);
            ApiError::Internal(e.to_string())
        })?;

        let body = tokens.map(move |chunk| {
            if let Err(e) = &chunk {
                error!("[{}] completion stream aborted: {}", request_id, e);
            }
            chunk
        });

        return Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
                (header::CACHE_CONTROL, "no-cache".to_string()),
            ],
            Body::from_stream(body),
        ).into_response());
    }

    let completion = client.complete(&messages).await.map_err(|e| {
        error!("[{}] completion failed: {}", request_id, e);
        ApiError::Internal(e.to_string())
    })?;

    let text = completion.response;
    let view = render(&text, true);
    let data = interpret(&text).into_data();
    info!("[{}] completion finished: {} chars, structured={}", request_id, text.len(), data.is_some());

    Ok(Json(ChatReply { text, data, view }).into_response())
}

async fn whisper_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TranscriptReply>, ApiError> {
    let transcriber = state.transcriber
        .clone()
        .ok_or(ApiError::MissingCredential(state.transcription_credential))?;

    let mut multipart = multipart.map_err(|e| {
        warn!("Transcription request without multipart body: {}", e);
        ApiError::BadRequest("No audio file provided".to_string())
    })?;

    let clip = read_audio_field(&mut multipart)
        .await?
        .ok_or_else(|| ApiError::BadRequest("No audio file provided".to_string()))?;

    info!(
        "Transcribing {} ({} bytes) with {} [{}]",
        clip.file_name,
        clip.bytes.len(),
        transcriber.get_model(),
        transcriber.language()
    );

    match transcriber.transcribe(clip).await {
        Ok(text) => Ok(Json(TranscriptReply { text })),
        Err(TranscriptionError::Upstream { status, body }) => {
            error!("Transcription provider error {}: {}", status, body);
            Err(ApiError::Upstream { status, details: body })
        }
        Err(e) => Err(ApiError::Internal(e.to_string())),
    }
}

async fn read_audio_field(multipart: &mut Multipart) -> Result<Option<AudioClip>, ApiError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!("Failed to read multipart: {}", e);
                return Err(ApiError::BadRequest(format!("Failed to read multipart: {}", e)));
            }
        };

        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("audio.webm").to_string();
        let content_type = field.content_type().map(|c| c.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read audio: {}", e)))?;

        if bytes.is_empty() {
            return Ok(None);
        }
        return Ok(Some(AudioClip::new(bytes.to_vec(), file_name, content_type)));
    }
}

async fn interpret_handler(
    body: Result<Json<InterpretRequest>, JsonRejection>,
) -> Result<Json<InterpretReply>, ApiError> {
    let req = json_body(body)?;
    Ok(Json(InterpretReply {
        interpretation: interpret(&req.text),
        view: render(&req.text, req.complete),
    }))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthReply {
        status: "ok",
        chat_configured: state.chat_client.is_some(),
        transcription_configured: state.transcriber.is_some(),
    })
}
