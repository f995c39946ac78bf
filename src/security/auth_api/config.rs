use crate::core::config::AuthSettings;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub require_auth: bool,
    pub bearer_prefix: String,
    pub allow_anonymous_paths: Vec<String>,
    pub public_paths: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            require_auth: true,
            bearer_prefix: "Bearer ".to_string(),
            allow_anonymous_paths: vec![
                "/health".to_string(),
                "/api/health".to_string(),
                "/api/auth/login".to_string(),
                "/api/auth/register".to_string(),
            ],
            public_paths: vec!["/".to_string(), "/favicon.ico".to_string()],
        }
    }
}

impl AuthConfig {
    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::default().with_require_auth(settings.require_auth)
    }

    pub fn with_require_auth(mut self, require: bool) -> Self {
        self.require_auth = require;
        self
    }

    pub fn is_public_path(&self, path: &str) -> bool {
        self.public_paths.iter().any(|p| path == p)
    }

    pub fn is_anonymous_allowed(&self, path: &str) -> bool {
        for allowed_path in &self.allow_anonymous_paths {
            if path == allowed_path || path.starts_with(&format!("{}/", allowed_path)) {
                return true;
            }
        }
        false
    }
}
