//! Single sign-on providers

pub mod azure;
pub mod hktdc;

pub use azure::{AzureSso, AzureTokenResponse};
pub use hktdc::{HktdcIdClaims, HktdcSso, HktdcTokenResponse, HktdcUserProfile};

use serde::{Deserialize, Serialize};

use crate::config::SsoConfig;
use crate::services::redis::RedisService;
use crate::utils::errors::{AppError, Result};

/// Lifetime of a pending login state
pub const STATE_TTL_SECONDS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SsoProvider {
    Hktdc,
    Azure,
}

impl SsoProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            SsoProvider::Hktdc => "hktdc",
            SsoProvider::Azure => "azure",
        }
    }
}

/// Configured SSO providers
#[derive(Debug, Clone, Default)]
pub struct SsoService {
    hktdc: Option<HktdcSso>,
    azure: Option<AzureSso>,
}

impl SsoService {
    pub fn new(config: &SsoConfig, redis: &RedisService) -> Result<Self> {
        let hktdc = config
            .hktdc
            .clone()
            .map(|c| HktdcSso::new(c, redis.clone()))
            .transpose()?;
        let azure = config
            .azure
            .clone()
            .map(|c| AzureSso::new(c, redis.clone()))
            .transpose()?;
        Ok(Self { hktdc, azure })
    }

    pub fn hktdc(&self) -> Result<&HktdcSso> {
        self.hktdc.as_ref().ok_or_else(|| not_configured(SsoProvider::Hktdc))
    }

    pub fn azure(&self) -> Result<&AzureSso> {
        self.azure.as_ref().ok_or_else(|| not_configured(SsoProvider::Azure))
    }

    pub fn is_enabled(&self, provider: SsoProvider) -> bool {
        match provider {
            SsoProvider::Hktdc => self.hktdc.is_some(),
            SsoProvider::Azure => self.azure.is_some(),
        }
    }
}

fn not_configured(provider: SsoProvider) -> AppError {
    AppError::not_found(format!("{} sso provider not configured", provider.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use assert_matches::assert_matches;

    #[test]
    fn test_unconfigured_providers() {
        let settings = Settings::default();
        let redis = RedisService::new(settings.redis.clone()).unwrap();
        let sso = SsoService::new(&settings.sso, &redis).unwrap();

        assert!(!sso.is_enabled(SsoProvider::Hktdc));
        assert!(!sso.is_enabled(SsoProvider::Azure));
        assert_matches!(sso.hktdc(), Err(AppError::NotFound(_)));
        assert_matches!(sso.azure(), Err(AppError::NotFound(_)));
    }
}
