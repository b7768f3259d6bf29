//! Password reset, profile edits and avatar upload

use axum::extract::State;
use axum::routing::{post, put};
use axum::Router;
use serde::Deserialize;

use crate::handlers::extract::{MultipartForm, ValidJson};
use crate::handlers::UploadResult;
use crate::middleware::auth::AuthUser;
use crate::models::user::{UpdateUserRequest, UserTitle};
use crate::response::{ok, ApiResponse};
use crate::state::AppState;
use crate::utils::errors::{AppError, Result};
use crate::utils::helpers::normalize_email;
use crate::utils::logging::log_user_action;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/set-password", post(set_password))
        .route("/user", put(update_user))
        .route("/avatar", post(upload_avatar))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPasswordForm {
    pub email: String,
    pub password: String,
    pub v_code: String,
}

pub async fn set_password(
    State(state): State<AppState>,
    ValidJson(form): ValidJson<SetPasswordForm>,
) -> Result<ApiResponse<&'static str>> {
    let email = normalize_email(&form.email);
    let user = state
        .db
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    if !state.services.integration_client.code_matches(&email, &form.v_code).await? {
        return Err(AppError::operating_failed("verification code not match"));
    }

    let password_hash = state.services.auth_service.hash_password(&form.password)?;
    state.db.users.set_password_hash(user.id, &password_hash).await?;

    log_user_action(&user.email, "set_password", None);
    Ok(ok("password reset successfully"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserForm {
    pub name: Option<String>,
    pub username: Option<String>,
    pub v_code: String,
}

pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(form): ValidJson<UpdateUserForm>,
) -> Result<ApiResponse<&'static str>> {
    let user = &auth.user;
    if !state
        .services
        .integration_client
        .code_matches(&user.email, &form.v_code)
        .await?
    {
        return Err(AppError::operating_failed("verification code not match"));
    }

    let mut update = UpdateUserRequest {
        name: form.name.clone(),
        username: form.username,
        ..Default::default()
    };

    // Organization names only change through an approved modify request
    if user.title == UserTitle::Organization {
        if let Some(name) = update.name.take() {
            let affiliation = user.affiliation.clone().unwrap_or_default();
            state.db.modify_requests.create(&user.email, &name, &affiliation).await?;
            log_user_action(&user.email, "request_name_change", Some(&name));
        }
    }

    if update.name.is_some() || update.username.is_some() {
        state.db.users.update(user.id, update).await?;
    }

    Ok(ok("user information update successfully"))
}

pub async fn upload_avatar(
    State(state): State<AppState>,
    auth: AuthUser,
    form: MultipartForm,
) -> Result<ApiResponse<UploadResult>> {
    let user = &auth.user;
    let file = form.required_file("avatar")?;

    let base_path = format!("account-avatar/{}/{}", user.title.display_name(), user.id);
    let avatar = state
        .services
        .storage_service
        .upload_image(&base_path, &file.content_type, file.bytes.clone())
        .await?;
    state.db.users.set_avatar(user.id, avatar).await?;

    Ok(ok(UploadResult::new("user avatar upload successfully", &file.bytes)))
}
