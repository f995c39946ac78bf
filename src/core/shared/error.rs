use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use log::error;

use crate::security::auth_api::AuthError;

#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type DeskResult<T> = Result<T, DeskError>;

impl DeskError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(format!("{} not found", resource.into()))
    }

    pub fn forbidden() -> Self {
        Self::Forbidden("You don't have permission to perform this action".to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Validation(_) => "validation_error",
            Self::Conflict(_) => "conflict",
            Self::Database(_) | Self::Internal(_) => "internal_error",
        }
    }

    /// Message safe to show to the caller. Database and internal details stay in the log.
    pub fn public_message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::Validation(msg)
            | Self::Conflict(msg) => msg.clone(),
            Self::Database(_) | Self::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

impl From<DieselError> for DeskError {
    fn from(e: DieselError) -> Self {
        match e {
            DieselError::NotFound => Self::NotFound("Record not found".to_string()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                Self::Conflict(format!("Duplicate value: {}", info.message()))
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                Self::Validation(format!("Invalid reference: {}", info.message()))
            }
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<diesel::r2d2::PoolError> for DeskError {
    fn from(e: diesel::r2d2::PoolError) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<AuthError> for DeskError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InsufficientPermissions | AuthError::AccountDisabled => {
                Self::Forbidden(e.message())
            }
            AuthError::InternalError(detail) => Self::Internal(detail),
            other => Self::Unauthorized(other.message()),
        }
    }
}

impl From<anyhow::Error> for DeskError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(format!("{e:#}"))
    }
}

impl From<std::io::Error> for DeskError {
    fn from(e: std::io::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<tokio::task::JoinError> for DeskError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for DeskError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Database(_) | Self::Internal(_)) {
            error!("{}", self);
        }
        let status = self.status_code();
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.error_code(),
            "message": self.public_message(),
        }));
        (status, body).into_response()
    }
}
