use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::booking::draft::FieldErrors;
use crate::client::ClientError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String),
    /// Local field validation failed; nothing was sent upstream.
    Validation(FieldErrors),
    BadGateway(&'static str, String),
    Internal(String),
}

impl ApiError {
    pub fn session_expired() -> Self {
        ApiError::Unauthorized("SESSION_EXPIRED", "Session expired".into())
    }

    pub fn wizard_not_found() -> Self {
        ApiError::NotFound("WIZARD_NOT_FOUND", "booking wizard not found".into())
    }

    fn to_error_response(code: &str, message: &str, fields: Option<FieldErrors>) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
                fields,
            },
        })
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Rejected { status: 401, .. } => ApiError::session_expired(),
            ClientError::Rejected { status, message } => {
                let message = message.unwrap_or_else(|| format!("upstream returned HTTP {status}"));
                match status {
                    403 => ApiError::Forbidden("FORBIDDEN", message),
                    404 => ApiError::NotFound("NOT_FOUND", message),
                    s if s < 500 => ApiError::BadRequest("UPSTREAM_REJECTED", message),
                    _ => ApiError::BadGateway("UPSTREAM_ERROR", message),
                }
            }
            ClientError::Transport(msg) => ApiError::BadGateway("UPSTREAM_UNAVAILABLE", msg),
            ClientError::Decode(msg) => ApiError::BadGateway("UPSTREAM_DECODE", msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(code, msg) => {
                (StatusCode::UNAUTHORIZED, ApiError::to_error_response(code, &msg, None)).into_response()
            }
            ApiError::Forbidden(code, msg) => {
                (StatusCode::FORBIDDEN, ApiError::to_error_response(code, &msg, None)).into_response()
            }
            ApiError::BadRequest(code, msg) => {
                (StatusCode::BAD_REQUEST, ApiError::to_error_response(code, &msg, None)).into_response()
            }
            ApiError::NotFound(code, msg) => {
                (StatusCode::NOT_FOUND, ApiError::to_error_response(code, &msg, None)).into_response()
            }
            ApiError::Conflict(code, msg) => {
                (StatusCode::CONFLICT, ApiError::to_error_response(code, &msg, None)).into_response()
            }
            ApiError::Validation(fields) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiError::to_error_response(
                    "VALIDATION_ERROR",
                    "some booking fields are missing or invalid",
                    Some(fields),
                ),
            )
                .into_response(),
            ApiError::BadGateway(code, msg) => {
                (StatusCode::BAD_GATEWAY, ApiError::to_error_response(code, &msg, None)).into_response()
            }
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::to_error_response("INTERNAL", &msg, None),
            )
                .into_response(),
        }
    }
}
