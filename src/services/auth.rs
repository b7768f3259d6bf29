//! Authentication service implementation
//!
//! This service handles password hashing, session token issuing and
//! validation, and the Redis-backed session registry that makes logout
//! effective before a token expires.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AuthConfig;
use crate::models::user::User;
use crate::services::redis::RedisService;
use crate::utils::errors::{AppError, Result};

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User email
    pub sub: String,
    pub name: String,
    pub title: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authentication service for passwords and session tokens
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
    redis: RedisService,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("token_ttl_seconds", &self.config.token_ttl_seconds)
            .finish()
    }
}

impl AuthService {
    /// Create a new AuthService instance
    pub fn new(config: AuthConfig, redis: RedisService) -> Self {
        Self { config, redis }
    }

    /// Hash a password as an Argon2id PHC string
    pub fn hash_password(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::PasswordHash(e.to_string()))
    }

    /// Check a password against a stored PHC string
    pub fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(password_hash).map_err(|e| AppError::PasswordHash(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Build the claims for a fresh session
    pub fn claims_for(&self, user: &User) -> SessionClaims {
        let now = Utc::now().timestamp();
        SessionClaims {
            sub: user.email.clone(),
            name: user.name.clone(),
            title: user.title.display_name(),
            jti: uuid::Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.config.token_ttl_seconds as i64,
        }
    }

    /// Sign claims into an HS256 token
    pub fn encode_claims(&self, claims: &SessionClaims) -> Result<String> {
        Ok(encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )?)
    }

    /// Verify signature and expiry
    pub fn decode_claims(&self, token: &str) -> Result<SessionClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        let data = decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            debug!(error = %e, "Session token rejected");
            AppError::unauthorized("invalid token")
        })?;
        Ok(data.claims)
    }

    /// Issue a token and register its session
    pub async fn issue_token(&self, user: &User) -> Result<String> {
        let claims = self.claims_for(user);
        let token = self.encode_claims(&claims)?;

        self.redis
            .set(&session_key(&claims.jti), &claims.sub, Some(self.config.token_ttl_seconds))
            .await?;

        info!(email = %user.email, jti = %claims.jti, "Session issued");
        Ok(token)
    }

    /// Claims of a valid token whose session is still registered
    pub async fn validate_token(&self, token: &str) -> Result<SessionClaims> {
        let claims = self.decode_claims(token)?;

        let registered: Option<String> = self.redis.get(&session_key(&claims.jti)).await?;
        match registered {
            Some(email) if email == claims.sub => Ok(claims),
            _ => Err(AppError::unauthorized("session expired")),
        }
    }

    /// Drop a session so its token stops working
    pub async fn revoke(&self, claims: &SessionClaims) -> Result<()> {
        self.redis.delete(&session_key(&claims.jti)).await?;
        info!(email = %claims.sub, jti = %claims.jti, "Session revoked");
        Ok(())
    }
}

fn session_key(jti: &str) -> String {
    format!("session:{}", jti)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::models::common::FileObject;
    use crate::models::user::{UserStatus, UserTitle};
    use assert_matches::assert_matches;
    use sqlx::types::Json;

    fn service() -> AuthService {
        let settings = Settings::default();
        let redis = RedisService::new(settings.redis.clone()).unwrap();
        AuthService::new(settings.auth, redis)
    }

    fn user() -> User {
        User {
            id: uuid::Uuid::new_v4(),
            email: "org@example.com".to_string(),
            name: "Org".to_string(),
            username: "org".to_string(),
            title: UserTitle::Organization,
            status: UserStatus::Active,
            password_hash: None,
            affiliation: None,
            sso_uid: None,
            avatar: Json(FileObject::png("account-avatar/default.png")),
            proven: true,
            email_verified: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let auth = service();
        let hash = auth.hash_password("correct horse").unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(auth.verify_password("correct horse", &hash).unwrap());
        assert!(!auth.verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn test_malformed_hash_is_error() {
        assert_matches!(service().verify_password("x", "plain-text"), Err(AppError::PasswordHash(_)));
    }

    #[test]
    fn test_claims_encode_decode() {
        let auth = service();
        let claims = auth.claims_for(&user());
        assert_eq!(claims.title, "Organization");

        let token = auth.encode_claims(&claims).unwrap();
        assert_eq!(auth.decode_claims(&token).unwrap(), claims);
    }

    #[test]
    fn test_expired_or_foreign_token_rejected() {
        let auth = service();
        let mut claims = auth.claims_for(&user());
        claims.exp = Utc::now().timestamp() - 10;
        let expired = auth.encode_claims(&claims).unwrap();
        assert_matches!(auth.decode_claims(&expired), Err(AppError::Unauthorized(_)));

        let mut other_config = Settings::default().auth;
        other_config.jwt_secret = "another-secret-of-enough-length".to_string();
        let other = AuthService::new(other_config, RedisService::new(Settings::default().redis).unwrap());
        let foreign = other.encode_claims(&other.claims_for(&user())).unwrap();
        assert_matches!(auth.decode_claims(&foreign), Err(AppError::Unauthorized(_)));
    }
}
