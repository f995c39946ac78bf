use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::core::shared::utils::DbPool;
use crate::security::auth_api::AuthConfig;
use crate::security::jwt::JwtManager;

pub struct AppState {
    pub conn: DbPool,
    pub config: AppConfig,
    pub jwt: Arc<JwtManager>,
    pub auth_config: Arc<AuthConfig>,
}

impl Clone for AppState {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            config: self.config.clone(),
            jwt: Arc::clone(&self.jwt),
            auth_config: Arc::clone(&self.auth_config),
        }
    }
}

impl AppState {
    pub fn new(conn: DbPool, config: AppConfig) -> Self {
        let jwt = Arc::new(JwtManager::from_settings(&config.auth));
        let auth_config = Arc::new(AuthConfig::from_settings(&config.auth));
        Self {
            conn,
            config,
            jwt,
            auth_config,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pool_size", &self.conn.max_size())
            .field("base_url", &self.config.server.base_url)
            .field("require_auth", &self.auth_config.require_auth)
            .finish()
    }
}
