//! Handler error type and its rendering as the error envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use taskdeck_shared::{ApiError, ErrorCode, ValidationError};
use thiserror::Error;

use crate::ai::AiError;
use crate::auth::AuthError;
use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    Auth { status: StatusCode, message: String },

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Unauthorized => ErrorCode::Unauthorized,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Validation(_) => ErrorCode::ValidationError,
            AppError::Auth { .. } => ErrorCode::AuthError,
            AppError::ServiceUnavailable(_) => ErrorCode::ServiceUnavailable,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Auth { status, .. } => *status,
            other => StatusCode::from_u16(other.code().default_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// Wraps a provider rejection with the status the route reports it as.
    pub fn auth(status: StatusCode, error: AuthError) -> Self {
        AppError::Auth {
            status,
            message: error.to_string(),
        }
    }

    pub fn ai_unavailable() -> Self {
        AppError::ServiceUnavailable(
            "AI service not configured. Please add OPENROUTER_API_KEY to your environment."
                .to_string(),
        )
    }

    /// Maps a repository failure, naming the entity in not-found and
    /// duplicate messages.
    pub fn from_store(entity: &'static str, error: StoreError) -> Self {
        match error {
            StoreError::NotFound => AppError::NotFound(entity),
            StoreError::Conflict => {
                AppError::Validation(format!("{entity} with this name already exists"))
            }
            StoreError::InvalidReference(what) => AppError::Validation(format!("{what} not found")),
            StoreError::Backend(detail) | StoreError::Decode(detail) => {
                tracing::error!(entity, error = %detail, "Persistence failure");
                AppError::Internal(format!("Failed to access {}", entity.to_lowercase()))
            }
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(error: ValidationError) -> Self {
        AppError::Validation(error.message)
    }
}

impl From<AiError> for AppError {
    fn from(error: AiError) -> Self {
        tracing::warn!(%error, "AI request failed");
        AppError::Internal(error.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ApiError::new(self.code(), self.to_string());
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::Unauthorized, StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized)]
    #[case(AppError::NotFound("Task"), StatusCode::NOT_FOUND, ErrorCode::NotFound)]
    #[case(AppError::Validation("bad".into()), StatusCode::BAD_REQUEST, ErrorCode::ValidationError)]
    #[case(AppError::ai_unavailable(), StatusCode::SERVICE_UNAVAILABLE, ErrorCode::ServiceUnavailable)]
    #[case(AppError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::InternalError)]
    fn status_and_code(
        #[case] error: AppError,
        #[case] status: StatusCode,
        #[case] code: ErrorCode,
    ) {
        assert_eq!(error.status(), status);
        assert_eq!(error.code(), code);
    }

    #[test]
    fn auth_error_keeps_route_status() {
        let error = AppError::auth(
            StatusCode::UNAUTHORIZED,
            AuthError::Rejected("Invalid login credentials".into()),
        );
        assert_eq!(error.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(error.code(), ErrorCode::AuthError);
        assert_eq!(error.to_string(), "Invalid login credentials");
    }

    #[test]
    fn store_errors_name_the_entity() {
        assert_eq!(
            AppError::from_store("Task", StoreError::NotFound).to_string(),
            "Task not found"
        );
        let conflict = AppError::from_store("Category", StoreError::Conflict);
        assert_eq!(conflict.to_string(), "Category with this name already exists");
        assert_eq!(conflict.code(), ErrorCode::ValidationError);
        let reference =
            AppError::from_store("Task", StoreError::InvalidReference("Category"));
        assert_eq!(reference.to_string(), "Category not found");
    }

    #[test]
    fn backend_failures_do_not_leak_details() {
        let error = AppError::from_store("Task", StoreError::Backend("password=hunter2".into()));
        assert_eq!(error.code(), ErrorCode::InternalError);
        assert!(!error.to_string().contains("hunter2"));
    }
}
