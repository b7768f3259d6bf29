//! HKTDC OAuth2/OIDC provider used by sellers

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::HktdcSsoConfig;
use crate::services::http::{build_client, send_with_retry, RetryPolicy};
use crate::services::redis::RedisService;
use crate::utils::errors::{AppError, Result};

use super::STATE_TTL_SECONDS;

const SCOPE: &str = "openid /v2/shared-services/management/user-profile.readonly";

/// Token endpoint response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HktdcTokenResponse {
    pub access_token: String,
    pub id_token: String,
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Claims of a validated id token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HktdcIdClaims {
    pub email: String,
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicProfile {
    pub first_name: String,
    pub last_name: String,
    pub email_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Seller profile from the shared-services user-profile API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HktdcUserProfile {
    pub ssouid: String,
    pub basic_profile: BasicProfile,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HktdcUserProfile {
    pub fn username(&self) -> String {
        format!("{}{}", self.basic_profile.first_name, self.basic_profile.last_name)
    }
}

#[derive(Debug, Deserialize)]
struct Jwks {
    #[serde(default)]
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: Option<String>,
    n: String,
    e: String,
}

/// HKTDC SSO client
#[derive(Debug, Clone)]
pub struct HktdcSso {
    client: reqwest::Client,
    config: HktdcSsoConfig,
    redis: RedisService,
    policy: RetryPolicy,
}

impl HktdcSso {
    pub fn new(config: HktdcSsoConfig, redis: RedisService) -> Result<Self> {
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
        format!("sso:hktdc:state:{}", state)
    }

    fn token_key(token: &str) -> String {
        format!("sso:hktdc:token:{}", token)
    }

    /// Authorization URL for a new login; the state is remembered for five minutes
    pub async fn login_url(&self) -> Result<String> {
        let state = uuid::Uuid::new_v4().to_string();
        let request_id = uuid::Uuid::new_v4().to_string();
        self.redis
            .set(&Self::state_key(&state), &request_id, Some(STATE_TTL_SECONDS))
            .await?;

        let mut url = Url::parse(&self.endpoint("/uaa/oauth2/authorize"))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("x_request_id", &request_id)
            .append_pair("scope", SCOPE)
            .append_pair("state", &state);
        Ok(url.into())
    }

    /// Exchange an authorization code, consuming the login state
    pub async fn exchange_code(&self, code: &str, state: &str) -> Result<HktdcTokenResponse> {
        let request_id: String = self
            .redis
            .take(&Self::state_key(state))
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid state"))?;

        let request = self
            .client
            .post(self.endpoint("/uaa/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .header("x-request-id", format!("CON-{}", request_id))
            .form(&[
                ("grant_type", "authorization_code"),
                ("scope", SCOPE),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ]);

        let response = send_with_retry(request, &self.policy).await.map_err(|e| {
            warn!(error = %e, "HKTDC token exchange failed");
            AppError::unauthorized("Token exchange failed")
        })?;
        Ok(response.json().await?)
    }

    /// Validate an RS256 id token against the provider's published key
    pub async fn validate_id_token(&self, id_token: &str) -> Result<HktdcIdClaims> {
        let request = self.client.get(self.endpoint("/uaa/oidc/jwks"));
        let jwks: Jwks = send_with_retry(request, &self.policy).await?.json().await?;
        let key = jwks
            .keys
            .into_iter()
            .next()
            .ok_or_else(|| AppError::unauthorized("invalid token"))?;

        let header = decode_header(id_token).map_err(|_| AppError::unauthorized("invalid token"))?;
        if header.kid != key.kid {
            return Err(AppError::unauthorized("invalid token"));
        }

        let decoding_key = DecodingKey::from_rsa_components(&key.n, &key.e)?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.config.client_id.as_str()]);

        let data = decode::<HktdcIdClaims>(id_token, &decoding_key, &validation).map_err(|e| {
            debug!(error = %e, "HKTDC id token rejected");
            AppError::unauthorized("invalid token")
        })?;
        Ok(data.claims)
    }

    /// Remember which email an access token belongs to
    pub async fn cache_access_token(&self, access_token: &str, email: &str, expires_in: u64) -> Result<()> {
        self.redis
            .set(&Self::token_key(access_token), &email, Some(expires_in.max(1)))
            .await
    }

    pub async fn email_for_token(&self, access_token: &str) -> Result<String> {
        self.redis
            .get(&Self::token_key(access_token))
            .await?
            .ok_or_else(|| AppError::unauthorized("invalid token"))
    }

    /// Fetch the profile of `email` on behalf of `access_token`
    pub async fn fetch_profile(&self, access_token: &str, email: &str) -> Result<HktdcUserProfile> {
        let request = self
            .client
            .get(self.endpoint("/shared-services/management/user-profiles"))
            .query(&[("queryType", "by_email"), ("email", email)])
            .bearer_auth(access_token)
            .header("x-api-key", &self.config.api_key)
            .header("x-request-id", format!("ORS-{}", uuid::Uuid::new_v4()));

        let response = send_with_retry(request, &self.policy).await.map_err(|e| match e {
            AppError::Http(_) => AppError::unauthorized("Token validation failed"),
            other => other,
        })?;
        Ok(response.json().await?)
    }

    /// Run the whole callback: state, token exchange, id token, token cache, profile
    pub async fn complete_login(&self, code: &str, state: &str) -> Result<(HktdcTokenResponse, HktdcUserProfile)> {
        let tokens = self.exchange_code(code, state).await?;
        let claims = self.validate_id_token(&tokens.id_token).await?;
        self.cache_access_token(&tokens.access_token, &claims.email, tokens.expires_in)
            .await?;
        let profile = self.fetch_profile(&tokens.access_token, &claims.email).await?;

        info!(email = %claims.email, ssouid = %profile.ssouid, "HKTDC login completed");
        Ok((tokens, profile))
    }

    pub async fn logout(&self, access_token: &str) -> Result<bool> {
        self.redis.delete(&Self::token_key(access_token)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_profile_keeps_unknown_fields() {
        let profile: HktdcUserProfile = serde_json::from_value(json!({
            "ssouid": "sso-1",
            "hasPassword": true,
            "basicProfile": {
                "firstName": "Chan",
                "lastName": "TaiMan",
                "emailId": "seller@example.com",
                "company": "ACME"
            }
        }))
        .unwrap();

        assert_eq!(profile.username(), "ChanTaiMan");
        assert_eq!(profile.extra["hasPassword"], json!(true));

        let back = serde_json::to_value(&profile).unwrap();
        assert_eq!(back["basicProfile"]["company"], "ACME");
        assert_eq!(back["basicProfile"]["emailId"], "seller@example.com");
    }

    #[test]
    fn test_token_response_shape() {
        let tokens: HktdcTokenResponse = serde_json::from_value(json!({
            "accessToken": "at",
            "idToken": "it",
            "expiresIn": 3600
        }))
        .unwrap();
        assert_eq!(tokens.access_token, "at");
        assert_eq!(tokens.expires_in, 3600);
        assert!(tokens.refresh_token.is_none());
    }
}
