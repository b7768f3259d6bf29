//! Single sign-on: HKTDC for sellers, Azure AD for administrators

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::handlers::extract::ValidQuery;
use crate::middleware::auth::{AdminUser, HktdcSession};
use crate::models::admin::{AdminProfile, AdminRole};
use crate::models::user::{CreateUserRequest, UserStatus, UserTitle};
use crate::response::{ok, ApiResponse};
use crate::services::sso::hktdc::HktdcUserProfile;
use crate::state::AppState;
use crate::utils::errors::Result;
use crate::utils::helpers::normalize_email;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/hktdc/login", get(hktdc_login))
        .route("/hktdc/callback", get(hktdc_callback))
        .route("/hktdc/user", get(hktdc_user))
        .route("/hktdc/logout", post(hktdc_logout))
        .route("/azure/login", get(azure_login))
        .route("/azure/callback", get(azure_callback))
        .route("/azure/profile", get(azure_profile))
}

/// 302 to `location`
fn found(location: String) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// Frontend URL carrying `accessToken` as an encoded query pair
fn token_redirect_url(frontend: &str, access_token: &str) -> Result<String> {
    let mut url = Url::parse(frontend)?;
    url.query_pairs_mut().append_pair("accessToken", access_token);
    Ok(url.into())
}

fn frontend_redirect(state: &AppState, access_token: &str) -> Result<Response> {
    Ok(found(token_redirect_url(&state.settings.app.frontend_domain, access_token)?))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
    pub state: String,
}

pub async fn hktdc_login(State(state): State<AppState>) -> Result<Response> {
    Ok(found(state.services.sso_service.hktdc()?.login_url().await?))
}

pub async fn hktdc_callback(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<CallbackQuery>,
) -> Result<Response> {
    let sso = state.services.sso_service.hktdc()?;
    let (tokens, profile) = sso.complete_login(&query.code, &query.state).await?;

    let email = normalize_email(&profile.basic_profile.email_id);
    let known = match state.db.users.find_by_sso_uid(&profile.ssouid).await? {
        Some(user) => Some(user),
        None => state.db.users.find_by_email(&email).await?,
    };
    if known.is_none() {
        let user = state
            .db
            .users
            .create(CreateUserRequest {
                email,
                name: profile.basic_profile.first_name.clone(),
                username: profile.username(),
                title: UserTitle::Seller,
                status: UserStatus::default(),
                password_hash: None,
                affiliation: None,
                sso_uid: Some(profile.ssouid.clone()),
            })
            .await?;
        info!(email = %user.email, "Seller account created on first HKTDC login");
    }

    frontend_redirect(&state, &tokens.access_token)
}

pub async fn hktdc_user(State(state): State<AppState>, session: HktdcSession) -> Result<ApiResponse<HktdcUserProfile>> {
    let profile = state
        .services
        .sso_service
        .hktdc()?
        .fetch_profile(&session.access_token, &session.email)
        .await?;
    Ok(ok(profile))
}

pub async fn hktdc_logout(State(state): State<AppState>, session: HktdcSession) -> Result<ApiResponse<&'static str>> {
    state.services.sso_service.hktdc()?.logout(&session.access_token).await?;
    info!(email = %session.email, "HKTDC session closed");
    Ok(ok("logged out successfully"))
}

pub async fn azure_login(State(state): State<AppState>) -> Result<Response> {
    Ok(found(state.services.sso_service.azure()?.login_url().await?))
}

pub async fn azure_callback(
    State(state): State<AppState>,
    ValidQuery(query): ValidQuery<CallbackQuery>,
) -> Result<Response> {
    let (tokens, profile) = state
        .services
        .sso_service
        .azure()?
        .complete_login(&query.code, &query.state)
        .await?;
    info!(mail = %profile.mail, "Azure login completed");
    frontend_redirect(&state, &tokens.access_token)
}

#[derive(Debug, Serialize)]
pub struct AdminSession {
    pub profile: AdminProfile,
    pub role: AdminRole,
}

pub async fn azure_profile(admin: AdminUser) -> Result<ApiResponse<AdminSession>> {
    Ok(ok(AdminSession {
        role: admin.administrator.role,
        profile: admin.profile,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found_sets_location() {
        let response = found("https://sso.example.com/authorize?state=abc".to_string());
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://sso.example.com/authorize?state=abc"
        );
    }

    #[test]
    fn test_access_token_is_query_encoded() {
        let url = token_redirect_url("https://shop.example.com/login?from=sso", "a+b/c=&d").unwrap();
        assert_eq!(url, "https://shop.example.com/login?from=sso&accessToken=a%2Bb%2Fc%3D%26d");

        let parsed = Url::parse(&url).unwrap();
        let token = parsed
            .query_pairs()
            .find(|(key, _)| key == "accessToken")
            .map(|(_, value)| value.into_owned());
        assert_eq!(token.as_deref(), Some("a+b/c=&d"));
    }

    #[test]
    fn test_invalid_frontend_domain_is_an_error() {
        assert!(token_redirect_url("not a url", "token").is_err());
    }
}
