use axum::{
    http::StatusCode,
    response::{ IntoResponse, Response },
    Json,
};
use log::error;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Provider credential absent; reported per request, never at startup.
    #[error("Missing {0} environment variable")]
    MissingCredential(&'static str),
    #[error("{0}")]
    BadRequest(String),
    #[error("Invalid request body")]
    InvalidBody(String),
    #[error("Transcription failed")]
    Upstream { status: u16, details: String },
    #[error("Internal server error")]
    Internal(String),
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingCredential(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) | ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            ApiError::Upstream { details, .. }
            | ApiError::Internal(details)
            | ApiError::InvalidBody(details) => Some(details.clone()),
            _ => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{} ({}): {:?}", self, status, self.details());
        }
        let body = ErrorBody {
            error: self.to_string(),
            details: self.details(),
        };
        (status, Json(body)).into_response()
    }
}
