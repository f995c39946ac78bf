use axum::{http::StatusCode, response::IntoResponse, Json};

use crate::core::shared::error::DeskError;

#[derive(Debug, thiserror::Error)]
pub enum DashboardsError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error(transparent)]
    Desk(#[from] DeskError),
}

impl From<crate::security::auth_api::AuthError> for DashboardsError {
    fn from(e: crate::security::auth_api::AuthError) -> Self {
        Self::Desk(e.into())
    }
}

impl IntoResponse for DashboardsError {
    fn into_response(self) -> axum::response::Response {
        match self {
            Self::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "success": false,
                    "error": "validation_error",
                    "message": msg,
                })),
            )
                .into_response(),
            Self::Desk(e) => e.into_response(),
        }
    }
}
