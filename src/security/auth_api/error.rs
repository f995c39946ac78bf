use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing_token")]
    MissingToken,
    #[error("invalid_token")]
    InvalidToken,
    #[error("expired_token")]
    ExpiredToken,
    #[error("invalid_credentials")]
    InvalidCredentials,
    #[error("insufficient_permissions")]
    InsufficientPermissions,
    #[error("account_disabled")]
    AccountDisabled,
    #[error("internal_error: {0}")]
    InternalError(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingToken => StatusCode::UNAUTHORIZED,
            Self::InvalidToken => StatusCode::UNAUTHORIZED,
            Self::ExpiredToken => StatusCode::UNAUTHORIZED,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::InsufficientPermissions => StatusCode::FORBIDDEN,
            Self::AccountDisabled => StatusCode::FORBIDDEN,
            Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::InvalidToken => "invalid_token",
            Self::ExpiredToken => "expired_token",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InsufficientPermissions => "insufficient_permissions",
            Self::AccountDisabled => "account_disabled",
            Self::InternalError(_) => "internal_error",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::MissingToken => "Authentication token is required".to_string(),
            Self::InvalidToken => "Invalid authentication token".to_string(),
            Self::ExpiredToken => "Authentication token has expired".to_string(),
            Self::InvalidCredentials => "Invalid email or password".to_string(),
            Self::InsufficientPermissions => {
                "You don't have permission to access this resource".to_string()
            }
            Self::AccountDisabled => "Your account has been disabled".to_string(),
            Self::InternalError(_) => "An internal error occurred".to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let Self::InternalError(detail) = &self {
            tracing::error!("Authentication failure: {}", detail);
        }
        let status = self.status_code();
        let body = Json(json!({
            "success": false,
            "error": self.error_code(),
            "message": self.message()
        }));
        (status, body).into_response()
    }
}
