use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::error;

use super::error_payload::ErrorPayload;
use crate::utils::api_errors::ApiError;

/// Application error types
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("A user cannot target themselves")]
    SelfReference,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Interaction between these users is blocked")]
    Blocked,

    #[error("Not found: {0}")]
    NotFound(String),

    /// An error to be returned when a business logic error occurs
    #[error("Business logic error: {0}")]
    BusinessLogicError(String),

    #[error("Internal server error")]
    InternalServerError(),
}

impl AppError {
    pub fn code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::SelfReference => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Blocked => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BusinessLogicError(_) => StatusCode::CONFLICT,
            AppError::InternalServerError() => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> String {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::SelfReference => "SELF_REFERENCE",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Blocked => "BLOCKED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BusinessLogicError(_) => "INVALID_STATE",
            AppError::InternalServerError() => "INTERNAL_SERVER_ERROR",
        }
        .to_string()
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::BadRequest(msg) => AppError::BadRequest(msg),
            ApiError::SelfReference => AppError::SelfReference,
            ApiError::Unauthorized(msg) => AppError::Forbidden(msg),
            ApiError::InvalidState(msg) => AppError::BusinessLogicError(msg),
            ApiError::Blocked => AppError::Blocked,
            ApiError::NotFound(msg) => AppError::NotFound(msg),
            ApiError::UserNotFound(id) => AppError::NotFound(format!("User {} not found", id)),
            other => {
                error!("Unhandled service error: {}", other);
                AppError::InternalServerError()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.code();
        let error_response = ErrorPayload {
            message: self.to_string(),
            code: status.as_u16(),
            r#type: self.error_type(),
            details: None,
        };

        (status, Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn service_errors_keep_their_status() {
        let cases = [
            (ApiError::SelfReference, StatusCode::BAD_REQUEST),
            (
                ApiError::Unauthorized("not the recipient".to_string()),
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::InvalidState("already accepted".to_string()),
                StatusCode::CONFLICT,
            ),
            (ApiError::Blocked, StatusCode::FORBIDDEN),
            (ApiError::UserNotFound(Uuid::new_v4()), StatusCode::NOT_FOUND),
            (
                ApiError::CounterDrift(Uuid::new_v4()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).code(), status);
        }
    }
}
