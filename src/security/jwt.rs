use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::core::config::AuthSettings;
use crate::core::shared::enums::UserRole;
use crate::security::auth_api::error::AuthError;

const LEEWAY_SECONDS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid> {
        Uuid::parse_str(&self.sub).map_err(|e| anyhow!("Invalid user ID in claims: {e}"))
    }
}

/// A signed token and the moment it stops being accepted.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct JwtManager {
    issuer: String,
    ttl_minutes: i64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(secret: &str, issuer: impl Into<String>, ttl_minutes: i64) -> Self {
        Self {
            issuer: issuer.into(),
            ttl_minutes,
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(
            &settings.jwt_secret,
            settings.issuer.clone(),
            settings.token_ttl_minutes,
        )
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        email: &str,
        full_name: &str,
        role: UserRole,
    ) -> Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + Duration::minutes(self.ttl_minutes);
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            name: full_name.to_string(),
            role,
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow!("Failed to encode access token: {e}"))?;
        debug!("Issued token for {} ({})", email, role);

        Ok(IssuedToken { token, expires_at })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.leeway = LEEWAY_SECONDS;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => {
                    debug!("Token validation failed: {e}");
                    AuthError::InvalidToken
                }
            })
    }
}
