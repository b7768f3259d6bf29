//! Services module
//!
//! This module contains the adapters to everything outside the database:
//! Redis, session tokens, object storage, the integration (mail) API, the
//! payment gateway aggregator and the SSO providers.

pub mod auth;
pub mod http;
pub mod mail;
pub mod payment;
pub mod redis;
pub mod sso;
pub mod storage;

// Re-export commonly used services
pub use auth::{AuthService, SessionClaims};
pub use http::{send_with_retry, RetryPolicy};
pub use mail::{IntegrationClient, MailTemplate, MailTemplates};
pub use payment::{CheckoutLineItem, CheckoutSessionRequest, PaymentGatewayClient, TransactionRecord};
pub use redis::RedisService;
pub use sso::{AzureSso, HktdcSso, SsoProvider, SsoService};
pub use storage::{LocalStorage, ObjectStorage, StorageService};

use crate::config::settings::Settings;
use crate::utils::errors::Result;

/// Service factory for creating and managing all services
#[derive(Clone, Debug)]
pub struct ServiceFactory {
    pub redis_service: RedisService,
    pub auth_service: AuthService,
    pub storage_service: StorageService,
    pub integration_client: IntegrationClient,
    pub payment_client: PaymentGatewayClient,
    pub sso_service: SsoService,
}

impl ServiceFactory {
    /// Create a new ServiceFactory with all services initialized
    pub fn new(settings: &Settings) -> Result<Self> {
        let redis_service = RedisService::new(settings.redis.clone())?;
        let auth_service = AuthService::new(settings.auth.clone(), redis_service.clone());
        let storage_service = StorageService::new(settings.storage.clone())?;
        let integration_client = IntegrationClient::new(settings.integration.clone())?;
        let payment_client = PaymentGatewayClient::new(settings.payment.clone())?;
        let sso_service = SsoService::new(&settings.sso, &redis_service)?;

        Ok(Self {
            redis_service,
            auth_service,
            storage_service,
            integration_client,
            payment_client,
            sso_service,
        })
    }

    /// Health check for all services
    pub async fn health_check(&self) -> ServiceHealthStatus {
        let redis_healthy = self.redis_service.health_check().await.unwrap_or(false);

        ServiceHealthStatus {
            redis_healthy,
            hktdc_sso_enabled: self.sso_service.is_enabled(SsoProvider::Hktdc),
            azure_sso_enabled: self.sso_service.is_enabled(SsoProvider::Azure),
        }
    }
}

/// Health status for all services
#[derive(Debug, Clone)]
pub struct ServiceHealthStatus {
    pub redis_healthy: bool,
    pub hktdc_sso_enabled: bool,
    pub azure_sso_enabled: bool,
}

impl ServiceHealthStatus {
    /// Sessions live in Redis, so nothing works without it
    pub fn is_healthy(&self) -> bool {
        self.redis_healthy
    }

    /// Get list of unhealthy or missing services
    pub fn get_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if !self.redis_healthy {
            issues.push("Redis connection failed".to_string());
        }
        if !self.hktdc_sso_enabled {
            issues.push("HKTDC SSO not configured".to_string());
        }
        if !self.azure_sso_enabled {
            issues.push("Azure SSO not configured".to_string());
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_issues() {
        let status = ServiceHealthStatus {
            redis_healthy: false,
            hktdc_sso_enabled: true,
            azure_sso_enabled: false,
        };
        assert!(!status.is_healthy());
        assert_eq!(
            status.get_issues(),
            vec!["Redis connection failed".to_string(), "Azure SSO not configured".to_string()]
        );
    }

    #[test]
    fn test_factory_builds_from_defaults() {
        let factory = ServiceFactory::new(&Settings::default()).unwrap();
        assert!(!factory.sso_service.is_enabled(SsoProvider::Hktdc));
        assert_eq!(factory.payment_client.currency(), "HKD");
    }
}
