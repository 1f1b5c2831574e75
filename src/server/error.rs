use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::infrastructure::error::{AiError, ScanError};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("AI service error: {0}")]
    Ai(#[from] AiError),

    #[error("{0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Scan(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Ai(AiError::QuotaExceeded) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Ai(AiError::MissingApiKey) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Ai(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Ai(AiError::QuotaExceeded) => "API quota exceeded.".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.message(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
