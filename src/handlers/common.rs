//! Account registration, login and user management

use std::collections::HashMap;

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::database::OrganizationRegistration;
use crate::handlers::extract::{ensure_email, MultipartForm, ValidJson, ValidQuery};
use crate::handlers::{notify_certification_ready, user_view};
use crate::middleware::auth::AuthUser;
use crate::models::common::{FileObject, SupportCertificateMime};
use crate::models::organization::OrganizationDocument;
use crate::models::user::{UpdateUserRequest, UserInformation, UserStatus, UserTitle};
use crate::response::{ok, ApiResponse, PageQuery, Pagination};
use crate::services::mail::ACCOUNT_STATUS_CHANGED;
use crate::state::AppState;
use crate::utils::errors::{AppError, Result};
use crate::utils::helpers::normalize_email;
use crate::utils::logging::{log_admin_action, log_user_action};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/user-info", get(user_info))
        .route("/users", get(list_users))
        .route("/users/status", post(change_user_status))
        .route("/send-v-code", post(send_verification_code))
        .route("/verify-email", post(verify_email))
        .route("/admins", get(list_admins))
}

/// Multipart organization registration
pub async fn register(State(state): State<AppState>, form: MultipartForm) -> Result<ApiResponse<&'static str>> {
    let email = normalize_email(&form.required("email")?);
    ensure_email("body", "email", &email)?;
    let name = form.required("name")?;
    let username = form.required("username")?;
    let password = form.required("password")?;
    let v_code = form.required("vCode")?;

    if state.db.users.find_by_email(&email).await?.is_some() {
        return Err(AppError::forbidden("email already registered"));
    }

    let documents: Vec<_> = OrganizationDocument::ALL
        .into_iter()
        .filter_map(|doc| form.file(doc.key()).map(|file| (doc, file)))
        .collect();
    if documents
        .iter()
        .any(|(_, file)| SupportCertificateMime::parse(&file.content_type).is_none())
    {
        return Err(AppError::forbidden("unsupported file type"));
    }

    if !state.services.integration_client.code_matches(&email, &v_code).await? {
        return Err(AppError::operating_failed("verification code not match"));
    }
    let admin = state
        .db
        .users
        .find_first_by_title(UserTitle::Admin)
        .await?
        .ok_or_else(|| AppError::forbidden("there is no supper admin account"))?;

    let password_hash = state.services.auth_service.hash_password(&password)?;
    let id = Uuid::new_v4();

    let storage = &state.services.storage_service;
    let mut stored = Vec::with_capacity(documents.len());
    for (doc, file) in documents {
        let base_path = format!("certificates/{}/{}", id, doc.key());
        match storage
            .upload_certificate(&base_path, &file.content_type, file.bytes.clone())
            .await
        {
            Ok(object) => stored.push((doc, object)),
            Err(e) => {
                discard_uploads(&state, &stored).await;
                return Err(e);
            }
        }
    }

    let registration = OrganizationRegistration {
        id,
        email,
        name,
        username,
        password_hash,
        administrator: admin.email.clone(),
        documents: stored.clone(),
    };
    let (user, certification) = match state.db.register_organization(registration).await {
        Ok(registered) => registered,
        Err(e) => {
            discard_uploads(&state, &stored).await;
            return Err(e);
        }
    };

    if certification.in_place() {
        notify_certification_ready(&state, &admin.email, &user.name).await;
    }

    log_user_action(&user.email, "register", Some(&admin.email));
    Ok(ok("registered successfully"))
}

/// Remove certificates stored for a registration that did not complete
async fn discard_uploads(state: &AppState, stored: &[(OrganizationDocument, FileObject)]) {
    for (_, file) in stored {
        if let Err(e) = state.services.storage_service.delete(&file.file_path).await {
            warn!(path = %file.file_path, error = %e, "Failed to remove certificate of failed registration");
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub token: String,
    pub email: String,
    pub name: String,
    pub username: String,
    pub title: String,
    pub avatar: String,
    pub affiliation: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    ValidJson(form): ValidJson<LoginForm>,
) -> Result<ApiResponse<LoginResponse>> {
    let email = normalize_email(&form.email);
    let user = state
        .db
        .users
        .find_by_email(&email)
        .await?
        .ok_or_else(|| AppError::operating_failed("email not registered"))?;

    let password_hash = user
        .password_hash
        .as_deref()
        .ok_or_else(|| AppError::operating_failed("password not set"))?;
    if !state.services.auth_service.verify_password(&form.password, password_hash)? {
        return Err(AppError::operating_failed("password not matched"));
    }

    let token = state.services.auth_service.issue_token(&user).await?;
    log_user_action(&user.email, "login", None);

    Ok(ok(LoginResponse {
        message: "login successfully".to_string(),
        token,
        avatar: state.access_url(&user.avatar.file_path),
        affiliation: (user.title != UserTitle::Admin).then(|| user.affiliation.clone()).flatten(),
        title: user.title.display_name(),
        email: user.email,
        name: user.name,
        username: user.username,
    }))
}

pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> Result<ApiResponse<&'static str>> {
    state.services.auth_service.revoke(&auth.claims).await?;
    Ok(ok("logged out successfully"))
}

pub async fn user_info(State(state): State<AppState>, auth: AuthUser) -> Result<ApiResponse<UserInformation>> {
    Ok(ok(user_view(&state, &auth.user)))
}

pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidQuery(page): ValidQuery<PageQuery>,
) -> Result<ApiResponse<Pagination<UserInformation>>> {
    let caller = auth.require(&[UserTitle::Admin, UserTitle::Organization])?;
    let page = page.normalized();

    let users = state
        .db
        .users
        .list_by_affiliation(&caller.email, page.limit(), page.offset())
        .await?;
    let total = state.db.users.count_by_affiliation(&caller.email).await?;

    let items = users.iter().map(|user| user_view(&state, user)).collect();
    Ok(ok(Pagination::new(items, total, page)))
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusForm {
    pub email: String,
    pub enable: bool,
    #[serde(default)]
    pub reason: String,
}

pub async fn change_user_status(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(form): ValidJson<ChangeStatusForm>,
) -> Result<ApiResponse<String>> {
    let caller = auth.require(&[UserTitle::Admin, UserTitle::Organization])?;
    let email = normalize_email(&form.email);

    let user = state
        .db
        .users
        .find_affiliated(&email, &caller.email)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;
    let status = user.status_change(form.enable)?;

    state
        .db
        .users
        .update(
            user.id,
            UpdateUserRequest {
                status: Some(status),
                ..Default::default()
            },
        )
        .await?;

    let status_name = match status {
        UserStatus::Active => "Active",
        _ => "Disabled",
    };
    let params = HashMap::from([
        ("email", user.email.clone()),
        ("affiliation", caller.email.clone()),
        ("status", status_name.to_string()),
        ("reason", form.reason.clone()),
    ]);
    state
        .services
        .integration_client
        .notify(&user.email, ACCOUNT_STATUS_CHANGED, &params)
        .await;

    log_admin_action(&caller.email, "change_user_status", Some(&user.email), Some(status_name));
    Ok(ok(format!(
        "status of user {} changed to {} successfully",
        form.email,
        if form.enable { "Enabled" } else { "Disabled" }
    )))
}

#[derive(Debug, Deserialize)]
pub struct SendCodeForm {
    pub email: String,
}

pub async fn send_verification_code(
    State(state): State<AppState>,
    ValidJson(form): ValidJson<SendCodeForm>,
) -> Result<ApiResponse<&'static str>> {
    let email = normalize_email(&form.email);
    ensure_email("body", "email", &email)?;
    state.v_code_limiter.check_verification_code(&email)?;

    match state.services.integration_client.send_verification_code(&email).await {
        Ok(true) => {
            info!(email = %email, "Verification code sent");
            Ok(ok("verification code sent"))
        }
        _ => Err(AppError::operating_failed("failed to send verification code")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailForm {
    pub email: String,
    pub v_code: String,
}

pub async fn verify_email(
    State(state): State<AppState>,
    ValidJson(form): ValidJson<VerifyEmailForm>,
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

    state
        .db
        .users
        .update(
            user.id,
            UpdateUserRequest {
                email_verified: Some(true),
                ..Default::default()
            },
        )
        .await?;
    Ok(ok("email verified"))
}

pub async fn list_admins(State(state): State<AppState>) -> Result<ApiResponse<Vec<UserInformation>>> {
    let admins = state.db.users.list_by_title(UserTitle::Admin).await?;
    Ok(ok(admins.iter().map(|user| user_view(&state, user)).collect()))
}
