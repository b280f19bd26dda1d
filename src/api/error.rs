//! Error-to-response mapping for the HTTP API.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use crate::error::{DatabaseError, MailError, PipelineError, ValidationError};

/// Anything a handler can fail with. Rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Invalid request body: {0}")]
    Body(String),

    #[error("{0} not found")]
    NotFound(String),
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        Self::Pipeline(PipelineError::Database(e))
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::Pipeline(PipelineError::Validation(e))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Body(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Body(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Pipeline(e) => match e {
                PipelineError::Validation(_) => StatusCode::BAD_REQUEST,
                PipelineError::Duplicate { .. } => StatusCode::CONFLICT,
                PipelineError::NotFound { .. } => StatusCode::NOT_FOUND,
                PipelineError::SourceNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                PipelineError::Sheet(_) => StatusCode::BAD_GATEWAY,
                PipelineError::Mail(mail) => match mail {
                    MailError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                    MailError::InvalidAddress { .. } => StatusCode::BAD_REQUEST,
                    MailError::Send(_) => StatusCode::BAD_GATEWAY,
                    MailError::NoDefaultTemplate
                    | MailError::Build(_)
                    | MailError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
                },
                PipelineError::Database(DatabaseError::NotFound { .. }) => StatusCode::NOT_FOUND,
                PipelineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
