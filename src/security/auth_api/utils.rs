use axum::body::Body;
use axum::http::{header, HeaderMap};
use tracing::debug;

use crate::security::auth_api::{config::AuthConfig, error::AuthError, types::AuthenticatedUser};
use crate::security::jwt::JwtManager;

/// The scheme in `prefix` is matched case-insensitively.
pub fn extract_bearer_token<'a>(headers: &'a HeaderMap, prefix: &str) -> Option<&'a str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let scheme = value.get(..prefix.len())?;
    if !scheme.eq_ignore_ascii_case(prefix) {
        return None;
    }
    value
        .get(prefix.len()..)
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub fn is_jwt_format(token: &str) -> bool {
    token.split('.').count() == 3
}

pub fn extract_user_from_request(
    request: &axum::http::Request<Body>,
    config: &AuthConfig,
    jwt: &JwtManager,
) -> Result<AuthenticatedUser, AuthError> {
    let token = match extract_bearer_token(request.headers(), &config.bearer_prefix) {
        Some(token) => token,
        None => return Err(AuthError::MissingToken),
    };

    if !is_jwt_format(token) {
        debug!("Bearer token is not a JWT");
        return Err(AuthError::InvalidToken);
    }

    let claims = jwt.verify(token)?;
    let user_id = claims.user_id().map_err(|_| AuthError::InvalidToken)?;

    Ok(AuthenticatedUser::new(
        user_id,
        claims.email,
        claims.name,
        claims.role,
    ))
}
