//! HTTP error handling and response types.
//!
//! Every failure leaves the server as `{"error": ...}`. Server-side detail is
//! logged here and never sent to the client.

use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::db::repository::RepositoryError;
use crate::validator::FieldErrors;

pub const NOT_FOUND_MESSAGE: &str = "the requested resource could not be found";
pub const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";
pub const NOT_PERMITTED_MESSAGE: &str =
    "your user account doesn't have the necessary permissions to access this resource";

/// API error response body.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError<T: Serialize> {
    pub error: T,
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Unknown route, malformed path parameter or missing record
    NotFound,
    /// Malformed request body or upload
    BadRequest(String),
    /// Well-formed input that breaks field rules
    FailedValidation(FieldErrors),
    /// Authenticated user lacks the privilege for this write
    Unauthorized,
    /// Method not supported on an existing route
    MethodNotAllowed(Method),
    /// Internal server error; the message is only logged
    Internal(String),
    /// Repository error: 404 for a missing record, 500 otherwise
    Repository(RepositoryError),
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiError {
            error: message.into(),
        }),
    )
        .into_response()
}

fn server_error(detail: &str) -> Response {
    tracing::error!(error = %detail, "request failed");
    error_body(StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_MESSAGE)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound => error_body(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE),
            AppError::BadRequest(msg) => error_body(StatusCode::BAD_REQUEST, msg),
            AppError::FailedValidation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiError { error: errors }),
            )
                .into_response(),
            AppError::Unauthorized => error_body(StatusCode::UNAUTHORIZED, NOT_PERMITTED_MESSAGE),
            AppError::MethodNotAllowed(method) => error_body(
                StatusCode::METHOD_NOT_ALLOWED,
                format!("the {} method is not supported for this resource", method),
            ),
            AppError::Internal(detail) => server_error(&detail),
            AppError::Repository(e) if e.is_not_found() => {
                tracing::debug!(error = %e, "record not found");
                error_body(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
            }
            AppError::Repository(e) => server_error(&e.to_string()),
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        AppError::Repository(err)
    }
}

/// Treat every repository failure, including a missing record, as a 500.
///
/// Used where a lookup happens after a successful write and its absence means
/// the stored data is inconsistent rather than that the client asked for
/// something that does not exist.
pub fn internal(err: RepositoryError) -> AppError {
    AppError::Internal(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_repository_not_found_maps_to_404() {
        let response = AppError::from(RepositoryError::not_found("Subject 4 not found")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], NOT_FOUND_MESSAGE);
    }

    #[tokio::test]
    async fn test_other_repository_errors_hide_detail() {
        let response =
            AppError::from(RepositoryError::query("relation \"subjects\" does not exist"))
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], SERVER_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_internal_ignores_not_found_kind() {
        let response = internal(RepositoryError::not_found("Student 9")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_failed_validation_is_a_field_map() {
        let mut errors = FieldErrors::new();
        errors.insert("stage".to_string(), "must be provided".to_string());
        let response = AppError::FailedValidation(errors).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body_json(response).await,
            serde_json::json!({"error": {"stage": "must be provided"}})
        );
    }
}
