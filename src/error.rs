use axum::{
    extract::rejection::{FormRejection, JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::{db::StoreError, validation::FieldErrors};

/// Abstract failure classes; every `AppError` belongs to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Unauthenticated,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(FieldErrors),

    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid or expired token")]
    InvalidJwt,

    #[error("insufficient privileges")]
    InsufficientPrivileges,
    #[error("current user is inactive")]
    CurrentUserInactive,
    #[error("current user is not a superuser")]
    CurrentUserNotSuperuser,
    #[error("user is inactive")]
    UserInactive,

    #[error("current user not found")]
    CurrentUserNotFound,
    #[error("user not found")]
    UserNotFound,
    #[error("follower relation not found")]
    FollowerRelationNotFound,
    #[error("post not found")]
    PostNotFound,
    #[error("endpoint not found")]
    EndpointNotFound,

    #[error("user already registered")]
    UserAlreadyRegistered,
    #[error("follower relation already registered")]
    FollowerRelationAlreadyRegistered,

    #[error("internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        use AppError::*;
        match self {
            Validation(_) => ErrorKind::Validation,
            InvalidCredentials | InvalidJwt => ErrorKind::Unauthenticated,
            InsufficientPrivileges | CurrentUserInactive | CurrentUserNotSuperuser
            | UserInactive => ErrorKind::Forbidden,
            CurrentUserNotFound | UserNotFound | FollowerRelationNotFound | PostNotFound
            | EndpointNotFound => ErrorKind::NotFound,
            UserAlreadyRegistered | FollowerRelationAlreadyRegistered => ErrorKind::Conflict,
            Internal(_) => ErrorKind::Internal,
        }
    }

    /// Machine-readable code sent as `detail`.
    pub fn code(&self) -> &'static str {
        use AppError::*;
        match self {
            Validation(_) => "validation_error",
            InvalidCredentials => "invalid_credentials",
            InvalidJwt => "invalid_jwt",
            InsufficientPrivileges => "insufficient_privileges",
            CurrentUserInactive => "current_user_inactive",
            CurrentUserNotSuperuser => "current_user_not_superuser",
            UserInactive => "user_inactive",
            CurrentUserNotFound => "current_user_not_found",
            UserNotFound => "user_not_found",
            FollowerRelationNotFound => "follower_relation_not_found",
            PostNotFound => "post_not_found",
            EndpointNotFound => "endpoint_not_found",
            UserAlreadyRegistered => "user_already_registered",
            FollowerRelationAlreadyRegistered => "follower_relation_already_registered",
            Internal(_) => "internal_server_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal(e: impl Into<anyhow::Error>) -> Self {
        AppError::Internal(e.into())
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::Internal(e.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        AppError::Validation(FieldErrors::single("body", e.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        AppError::Validation(FieldErrors::single("query", e.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(e: PathRejection) -> Self {
        AppError::Validation(FieldErrors::single("path", e.body_text()))
    }
}

impl From<FormRejection> for AppError {
    fn from(e: FormRejection) -> Self {
        AppError::Validation(FieldErrors::single("body", e.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AppError::Validation(fields) => json!({ "detail": fields }),
            AppError::Internal(cause) => {
                error!(error = %format!("{cause:#}"), "request failed");
                json!({ "detail": self.code() })
            }
            other => json!({ "detail": other.code() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_statuses() {
        assert_eq!(AppError::InvalidJwt.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::InsufficientPrivileges.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::PostNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::FollowerRelationAlreadyRegistered.status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Validation(FieldErrors::single("limit", "too small")).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_errors_are_internal() {
        let err: AppError = StoreError::Timeout(std::time::Duration::from_secs(10)).into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.code(), "internal_server_error");
    }
}
