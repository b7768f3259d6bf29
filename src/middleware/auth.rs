//! Authentication extractors
//!
//! [`AuthUser`] resolves a platform session token to its user, [`AdminUser`]
//! resolves an Azure access token to an administrator and [`HktdcSession`]
//! resolves an HKTDC access token to the seller's email. Each one rejects the
//! request with an `Unauthorized` envelope before the handler runs.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use tracing::{debug, warn};

use crate::models::admin::{AdminProfile, AdminRole, Administrator};
use crate::models::user::{User, UserTitle};
use crate::services::auth::SessionClaims;
use crate::state::AppState;
use crate::utils::errors::AppError;

/// Token from an `Authorization: Bearer` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn require_bearer(parts: &Parts) -> Result<&str, AppError> {
    bearer_token(&parts.headers).ok_or_else(|| AppError::unauthorized("Not authenticated"))
}

/// Authenticated platform user
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub claims: SessionClaims,
}

impl AuthUser {
    /// Title allow-list check
    pub fn require(&self, allowed: &[UserTitle]) -> Result<&User, AppError> {
        if self.user.has_title(allowed) {
            Ok(&self.user)
        } else {
            warn!(email = %self.user.email, title = %self.user.title.as_str(), "Title not allowed");
            Err(AppError::forbidden("User not have access"))
        }
    }

    pub fn email(&self) -> &str {
        &self.user.email
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = require_bearer(parts)?;
        let claims = state.services.auth_service.validate_token(token).await?;

        let user = state
            .db
            .users
            .find_by_email(&claims.sub)
            .await?
            .ok_or_else(|| AppError::unauthorized("invalid token"))?;

        debug!(email = %user.email, "Request authenticated");
        Ok(Self { user, claims })
    }
}

/// Authenticated Azure administrator
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub profile: AdminProfile,
    pub administrator: Administrator,
}

impl AdminUser {
    pub fn require(&self, allowed: &[AdminRole]) -> Result<&Administrator, AppError> {
        if self.administrator.has_role(allowed) {
            Ok(&self.administrator)
        } else {
            Err(AppError::forbidden("User not have access"))
        }
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = require_bearer(parts)?;
        let profile = state.services.sso_service.azure()?.profile(token).await?;

        let administrator = state
            .db
            .admin
            .find_administrator(&profile.mail.to_lowercase())
            .await?
            .ok_or_else(|| AppError::forbidden("User not found"))?;

        Ok(Self { profile, administrator })
    }
}

/// Seller holding a cached HKTDC access token
#[derive(Debug, Clone)]
pub struct HktdcSession {
    pub access_token: String,
    pub email: String,
}

impl FromRequestParts<AppState> for HktdcSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = require_bearer(parts)?.to_string();
        let email = state.services.sso_service.hktdc()?.email_for_token(&token).await?;
        Ok(Self {
            access_token: token,
            email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
