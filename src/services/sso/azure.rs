//! Azure AD provider used by administrators

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::config::AzureSsoConfig;
use crate::models::admin::AdminProfile;
use crate::services::http::{build_client, send_with_retry, RetryPolicy};
use crate::services::redis::RedisService;
use crate::utils::errors::{AppError, Result};

use super::STATE_TTL_SECONDS;

const SCOPE: &str = "User.Read";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureTokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

/// Azure AD client
#[derive(Debug, Clone)]
pub struct AzureSso {
    client: reqwest::Client,
    config: AzureSsoConfig,
    redis: RedisService,
    policy: RetryPolicy,
}

impl AzureSso {
    pub fn new(config: AzureSsoConfig, redis: RedisService) -> Result<Self> {
        Ok(Self {
            client: build_client(10)?,
            config,
            redis,
            policy: RetryPolicy::default(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn state_key(state: &str) -> String {
        format!("sso:azure:state:{}", state)
    }

    pub async fn login_url(&self) -> Result<String> {
        let state = uuid::Uuid::new_v4().to_string();
        self.redis
            .set(&Self::state_key(&state), &1u8, Some(STATE_TTL_SECONDS))
            .await?;

        let mut url = Url::parse(&self.endpoint("/oauth2/v2.0/authorize"))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_mode", "query")
            .append_pair("scope", SCOPE)
            .append_pair("state", &state)
            .append_pair("prompt", "select_account");
        Ok(url.into())
    }

    /// Exchange an authorization code, consuming the login state
    pub async fn exchange_code(&self, code: &str, state: &str) -> Result<AzureTokenResponse> {
        let known: Option<u8> = self.redis.take(&Self::state_key(state)).await?;
        if known.is_none() {
            return Err(AppError::unauthorized("Invalid state"));
        }

        let request = self.client.post(self.endpoint("/oauth2/v2.0/token")).form(&[
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("scope", SCOPE),
        ]);

        let response = send_with_retry(request, &self.policy).await.map_err(|e| {
            warn!(error = %e, "Azure token exchange failed");
            AppError::unauthorized("Token exchange failed")
        })?;
        Ok(response.json().await?)
    }

    /// Graph profile of the holder of `access_token`
    pub async fn profile(&self, access_token: &str) -> Result<AdminProfile> {
        let url = format!("{}/v1.0/me", self.config.graph_url.trim_end_matches('/'));
        let request = self.client.get(url).bearer_auth(access_token);

        let response = send_with_retry(request, &self.policy).await.map_err(|e| match e {
            AppError::Http(_) => AppError::unauthorized("invalid token"),
            other => other,
        })?;
        Ok(response.json().await?)
    }

    /// Callback flow: returns the access token to hand to the frontend
    pub async fn complete_login(&self, code: &str, state: &str) -> Result<(AzureTokenResponse, AdminProfile)> {
        let tokens = self.exchange_code(code, state).await?;
        let profile = self.profile(&tokens.access_token).await?;
        info!(email = %profile.mail, "Azure login completed");
        Ok((tokens, profile))
    }
}
