//! Configuration validation module
//!
//! This module provides validation functions for application configuration
//! to ensure all required settings are properly configured.

use crate::utils::errors::{AppError, Result};
use super::settings::{StorageProvider, Settings};

/// Validate all configuration settings
pub fn validate_settings(settings: &Settings) -> Result<()> {
    validate_app_config(&settings.app)?;
    validate_database_config(&settings.database)?;
    validate_redis_config(&settings.redis)?;
    validate_auth_config(&settings.auth)?;
    validate_storage_config(&settings.storage)?;
    validate_integration_config(&settings.integration)?;
    validate_payment_config(&settings.payment)?;
    validate_logging_config(&settings.logging)?;

    if let Some(ref hktdc) = settings.sso.hktdc {
        validate_sso_urls("HKTDC", &hktdc.base_url, &hktdc.redirect_uri, &hktdc.client_id)?;
    }
    if let Some(ref azure) = settings.sso.azure {
        validate_sso_urls("Azure", &azure.base_url, &azure.redirect_uri, &azure.client_id)?;
    }

    if settings.rate_limit.verification_code_per_minute == 0 {
        return Err(AppError::Config(
            "Verification code rate limit must be greater than 0".to_string()
        ));
    }

    if settings.rate_limit.cleanup_interval_seconds == 0 {
        return Err(AppError::Config(
            "Rate limit cleanup interval must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate HTTP application configuration
fn validate_app_config(config: &super::AppConfig) -> Result<()> {
    if config.app_no.is_empty() {
        return Err(AppError::Config(
            "Application number (response category) is required".to_string()
        ));
    }

    if config.frontend_domain.is_empty() {
        return Err(AppError::Config(
            "Frontend domain is required".to_string()
        ));
    }
    url::Url::parse(&config.frontend_domain)
        .map_err(|e| AppError::Config(format!("Invalid frontend domain: {}", e)))?;

    if config.request_timeout_seconds == 0 {
        return Err(AppError::Config(
            "Request timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate database configuration
fn validate_database_config(config: &super::DatabaseConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(AppError::Config(
            "Database URL is required".to_string()
        ));
    }

    if config.max_connections == 0 {
        return Err(AppError::Config(
            "Max connections must be greater than 0".to_string()
        ));
    }

    if config.min_connections > config.max_connections {
        return Err(AppError::Config(
            "Min connections cannot be greater than max connections".to_string()
        ));
    }

    Ok(())
}

/// Validate Redis configuration
fn validate_redis_config(config: &super::RedisConfig) -> Result<()> {
    if config.url.is_empty() {
        return Err(AppError::Config(
            "Redis URL is required".to_string()
        ));
    }

    Ok(())
}

/// Validate session token configuration
fn validate_auth_config(config: &super::AuthConfig) -> Result<()> {
    if config.jwt_secret.len() < 16 {
        return Err(AppError::Config(
            "JWT secret must be at least 16 characters".to_string()
        ));
    }

    if config.token_ttl_seconds == 0 {
        return Err(AppError::Config(
            "Token TTL must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate object storage configuration
fn validate_storage_config(config: &super::StorageConfig) -> Result<()> {
    match config.provider {
        StorageProvider::Local if config.root_dir.is_empty() => {
            return Err(AppError::Config(
                "Storage root directory is required for the local provider".to_string()
            ));
        }
        StorageProvider::Http if config.base_url.as_deref().unwrap_or_default().is_empty() => {
            return Err(AppError::Config(
                "Storage base URL is required for the http provider".to_string()
            ));
        }
        _ => {}
    }

    if config.signing_key.is_empty() {
        return Err(AppError::Config(
            "Storage signing key is required".to_string()
        ));
    }

    if config.url_ttl_seconds == 0 {
        return Err(AppError::Config(
            "Storage URL TTL must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate integration API configuration
fn validate_integration_config(config: &super::IntegrationConfig) -> Result<()> {
    if config.base_url.is_empty() {
        return Err(AppError::Config(
            "Integration API URL is required".to_string()
        ));
    }

    if config.timeout_seconds == 0 {
        return Err(AppError::Config(
            "Integration API timeout must be greater than 0".to_string()
        ));
    }

    Ok(())
}

/// Validate payment aggregator configuration
fn validate_payment_config(config: &super::PaymentConfig) -> Result<()> {
    if config.base_url.is_empty() {
        return Err(AppError::Config(
            "Payment gateway API URL is required".to_string()
        ));
    }

    if config.currency.len() != 3 {
        return Err(AppError::Config(
            format!("Invalid payment currency: {}", config.currency)
        ));
    }

    Ok(())
}

fn validate_sso_urls(provider: &str, base_url: &str, redirect_uri: &str, client_id: &str) -> Result<()> {
    if client_id.is_empty() {
        return Err(AppError::Config(
            format!("{} SSO client id is required", provider)
        ));
    }

    for value in [base_url, redirect_uri] {
        url::Url::parse(value)
            .map_err(|e| AppError::Config(format!("Invalid {} SSO URL '{}': {}", provider, value, e)))?;
    }

    Ok(())
}

/// Validate logging configuration
fn validate_logging_config(config: &super::LoggingConfig) -> Result<()> {
    if config.level.is_empty() {
        return Err(AppError::Config(
            "Log level is required".to_string()
        ));
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.level.as_str()) {
        return Err(AppError::Config(
            format!("Invalid log level: {}. Valid levels: {:?}", config.level, valid_levels)
        ));
    }

    Ok(())
}
