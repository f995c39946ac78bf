//! Layered application configuration.
//!
//! Merge order (later overrides earlier):
//! 1. Compiled defaults
//! 2. `helpdesk.toml` (or the file named by `HELPDESK_CONFIG`)
//! 3. `HELPDESK_*` environment variables, `__` separating sections
//!    (`HELPDESK_SERVER__PORT=9000`)
//!
//! `DATABASE_URL` fills `database.url` when no other layer sets it.

#![allow(clippy::result_large_err)]

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::core::shared::enums::TicketPriority;

pub const DEFAULT_CONFIG_FILE: &str = "helpdesk.toml";
pub const DEV_JWT_SECRET: &str = "dev-secret-key-change-in-production-minimum-32-chars";
/// One year.
pub const MAX_SLA_HOURS: i64 = 24 * 366;
/// One day.
pub const MAX_SWEEP_INTERVAL_MINUTES: u64 = 24 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Figment(#[from] figment::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthSettings,
    pub sla: SlaConfig,
    pub attachments: AttachmentConfig,
    pub notifications: NotificationConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bootstrap_admin: Option<BootstrapAdminConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            base_url: "http://localhost:8080".to_string(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout_seconds: u64,
    pub run_migrations: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            connection_timeout_seconds: 5,
            run_migrations: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub issuer: String,
    pub token_ttl_minutes: i64,
    pub require_auth: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: "university-helpdesk".to_string(),
            token_ttl_minutes: 8 * 60,
            require_auth: true,
        }
    }
}

/// Response and resolution targets for one priority level, in hours.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaTarget {
    pub first_response_hours: i64,
    pub resolution_hours: i64,
}

impl SlaTarget {
    pub const fn new(first_response_hours: i64, resolution_hours: i64) -> Self {
        Self {
            first_response_hours,
            resolution_hours,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SlaConfig {
    pub low: SlaTarget,
    pub medium: SlaTarget,
    pub high: SlaTarget,
    pub urgent: SlaTarget,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            low: SlaTarget::new(24, 120),
            medium: SlaTarget::new(8, 72),
            high: SlaTarget::new(4, 24),
            urgent: SlaTarget::new(1, 8),
        }
    }
}

impl SlaConfig {
    pub fn target(&self, priority: TicketPriority) -> SlaTarget {
        match priority {
            TicketPriority::Low => self.low,
            TicketPriority::Medium => self.medium,
            TicketPriority::High => self.high,
            TicketPriority::Urgent => self.urgent,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttachmentConfig {
    pub storage_dir: String,
    pub max_size_bytes: u64,
    pub allowed_content_types: Vec<String>,
}

impl Default for AttachmentConfig {
    fn default() -> Self {
        Self {
            storage_dir: "./data/attachments".to_string(),
            max_size_bytes: 10 * 1024 * 1024,
            allowed_content_types: [
                "image/png",
                "image/jpeg",
                "image/gif",
                "application/pdf",
                "text/plain",
                "application/msword",
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
                "application/vnd.ms-excel",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "application/zip",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl AttachmentConfig {
    pub fn is_allowed(&self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();
        self.allowed_content_types.iter().any(|t| *t == essence)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub sla_sweep_interval_minutes: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            sla_sweep_interval_minutes: 10,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BootstrapAdminConfig {
    pub email: String,
    pub password: String,
    #[serde(default = "default_admin_name")]
    pub full_name: String,
}

fn default_admin_name() -> String {
    "Helpdesk Administrator".to_string()
}

impl AppConfig {
    /// Load defaults, the TOML file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("HELPDESK_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let figment = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("HELPDESK_").split("__"));
        Self::from_figment(figment)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let figment = Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(content));
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let mut config: AppConfig = figment.extract()?;

        if config.database.url.is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                config.database.url = url;
            }
        }

        if config.auth.jwt_secret.is_empty() {
            log::warn!(
                "auth.jwt_secret not set, using default development secret - DO NOT USE IN PRODUCTION"
            );
            config.auth.jwt_secret = DEV_JWT_SECRET.to_string();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.is_empty() {
            return Err(ConfigError::Invalid(
                "database.url (or DATABASE_URL) is required".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.auth.jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid(
                "auth.jwt_secret must be at least 32 characters".to_string(),
            ));
        }
        if self.auth.token_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "auth.token_ttl_minutes must be positive".to_string(),
            ));
        }
        for priority in TicketPriority::ALL {
            let target = self.sla.target(priority);
            if target.first_response_hours <= 0 || target.resolution_hours <= 0 {
                return Err(ConfigError::Invalid(format!(
                    "sla.{} hours must be positive",
                    priority
                )));
            }
            if target.resolution_hours > MAX_SLA_HOURS {
                return Err(ConfigError::Invalid(format!(
                    "sla.{} hours cannot exceed {}",
                    priority, MAX_SLA_HOURS
                )));
            }
            if target.first_response_hours > target.resolution_hours {
                return Err(ConfigError::Invalid(format!(
                    "sla.{}: first response cannot exceed resolution time",
                    priority
                )));
            }
        }
        let sweep = self.notifications.sla_sweep_interval_minutes;
        if sweep == 0 || sweep > MAX_SWEEP_INTERVAL_MINUTES {
            return Err(ConfigError::Invalid(format!(
                "notifications.sla_sweep_interval_minutes must be between 1 and {}",
                MAX_SWEEP_INTERVAL_MINUTES
            )));
        }
        if self.attachments.max_size_bytes == 0 {
            return Err(ConfigError::Invalid(
                "attachments.max_size_bytes must be positive".to_string(),
            ));
        }
        if let Some(admin) = &self.bootstrap_admin {
            if admin.email.trim().is_empty() || admin.password.is_empty() {
                return Err(ConfigError::Invalid(
                    "bootstrap_admin needs both email and password".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
