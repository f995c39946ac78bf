use axum::http::{header, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::info;

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<Method>,
    pub allowed_headers: Vec<header::HeaderName>,
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ],
            allowed_headers: vec![header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT],
            max_age_secs: 3600,
        }
    }
}

impl CorsConfig {
    pub fn with_origins(mut self, origins: &[String]) -> Self {
        self.allowed_origins = origins
            .iter()
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();
        self
    }

    /// With no configured origins only local development hosts are accepted.
    pub fn build(self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        let allow_origin = if origins.is_empty() {
            info!("CORS: no origins configured, allowing localhost only");
            AllowOrigin::predicate(|origin: &HeaderValue, _| is_local_origin(origin))
        } else {
            info!("CORS: {} allowed origin(s)", origins.len());
            AllowOrigin::list(origins)
        };

        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(self.allowed_methods)
            .allow_headers(self.allowed_headers)
            .max_age(Duration::from_secs(self.max_age_secs))
    }
}

pub fn is_local_origin(origin: &HeaderValue) -> bool {
    let Ok(origin) = origin.to_str() else {
        return false;
    };
    let host = origin
        .strip_prefix("http://")
        .or_else(|| origin.strip_prefix("https://"))
        .unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    matches!(host, "localhost" | "127.0.0.1")
}

pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    CorsConfig::default().with_origins(origins).build()
}
