//! Application settings management
//!
//! This module defines the configuration structure and provides methods
//! for loading settings from TOML files and environment variables.

use serde::{Deserialize, Serialize};

/// Main application configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub integration: IntegrationConfig,
    pub payment: PaymentConfig,
    #[serde(default)]
    pub sso: SsoConfig,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    pub logging: LoggingConfig,
}

/// HTTP application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    /// Envelope category attached to every response
    pub app_no: String,
    pub env: String,
    pub frontend_domain: String,
    pub host: String,
    pub port: u16,
    pub request_timeout_seconds: u64,
    pub body_limit_bytes: usize,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedisConfig {
    pub url: String,
    pub prefix: String,
    pub ttl_seconds: u64,
}

/// Session token configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_seconds: u64,
}

/// Object storage backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Local,
    Http,
}

/// Object storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub provider: StorageProvider,
    /// Root directory for the local provider
    pub root_dir: String,
    /// Bucket endpoint for the http provider
    pub base_url: Option<String>,
    /// Public origin used when building signed access URLs
    pub public_url: String,
    pub signing_key: String,
    pub url_ttl_seconds: u64,
    pub timeout_seconds: u64,
}

/// Mail and verification code integration API
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntegrationConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_seconds: u64,
}

/// Payment gateway aggregator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    pub currency: String,
}

/// SSO providers, each optional
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SsoConfig {
    pub hktdc: Option<HktdcSsoConfig>,
    pub azure: Option<AzureSsoConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HktdcSsoConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AzureSsoConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    #[serde(default = "default_graph_url")]
    pub graph_url: String,
}

fn default_graph_url() -> String {
    "https://graph.microsoft.com".to_string()
}

/// Rate limit configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitSettings {
    pub verification_code_per_minute: u32,
    /// How often idle limiter keys are dropped
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

fn default_cleanup_interval() -> u64 {
    300
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            verification_code_per_minute: 3,
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file_path: String,
    #[serde(default)]
    pub json: bool,
}

impl Settings {
    /// Load settings from configuration file and environment variables
    pub fn new() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("FRSAAS")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), crate::utils::errors::AppError> {
        super::validation::validate_settings(self)
    }

    /// Socket address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.app.host, self.app.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app: AppConfig {
                name: "frsaas".to_string(),
                app_no: "00".to_string(),
                env: "development".to_string(),
                frontend_domain: "http://localhost:3000".to_string(),
                host: "0.0.0.0".to_string(),
                port: 8000,
                request_timeout_seconds: 30,
                body_limit_bytes: 20 * 1024 * 1024,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/frsaas".to_string(),
                max_connections: 10,
                min_connections: 1,
            },
            redis: RedisConfig {
                url: "redis://localhost:6379".to_string(),
                prefix: "frsaas:".to_string(),
                ttl_seconds: 3600,
            },
            auth: AuthConfig {
                jwt_secret: "change-me-in-production".to_string(),
                token_ttl_seconds: 7 * 24 * 3600,
            },
            storage: StorageConfig {
                provider: StorageProvider::Local,
                root_dir: "./statics".to_string(),
                base_url: None,
                public_url: "http://localhost:8000/statics".to_string(),
                signing_key: "change-me-in-production".to_string(),
                url_ttl_seconds: 3600,
                timeout_seconds: 30,
            },
            integration: IntegrationConfig {
                base_url: "http://localhost:9000".to_string(),
                api_key: String::new(),
                timeout_seconds: 10,
            },
            payment: PaymentConfig {
                base_url: "http://localhost:9100".to_string(),
                timeout_seconds: 10,
                currency: "HKD".to_string(),
            },
            sso: SsoConfig::default(),
            rate_limit: RateLimitSettings::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: "./statics/logs".to_string(),
                json: false,
            },
        }
    }
}
