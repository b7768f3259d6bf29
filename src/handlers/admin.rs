//! Administrator operations: gateway configuration, organization approvals
//! and name-change reviews

use std::collections::BTreeMap;

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handlers::extract::ValidJson;
use crate::handlers::user_view;
use crate::middleware::auth::AuthUser;
use crate::models::admin::AdminGatewayEntry;
use crate::models::payment::PaymentGateway;
use crate::models::user::{UpdateUserRequest, UserInformation, UserModifyRequest, UserStatus, UserTitle};
use crate::response::{ok, ApiResponse};
use crate::state::AppState;
use crate::utils::errors::{AppError, Result};
use crate::utils::helpers::normalize_email;
use crate::utils::logging::log_admin_action;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/configuration", get(configuration))
        .route("/approvals", get(list_approvals).post(approve))
        .route("/modify-requests", get(list_modify_requests).post(review_modify_request))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminConfigurationView {
    pub id: Uuid,
    pub affiliation: String,
    pub payment_gateway: BTreeMap<PaymentGateway, AdminGatewayEntry>,
}

pub async fn configuration(State(state): State<AppState>, auth: AuthUser) -> Result<ApiResponse<AdminConfigurationView>> {
    let caller = auth.require(&[UserTitle::Admin])?;
    let config = state.db.ensure_admin_configuration(&caller.email).await?;

    let payment_gateway = config
        .payment_gateway
        .0
        .into_iter()
        .map(|(gateway, mut entry)| {
            entry.image = state.access_url(&entry.image);
            (gateway, entry)
        })
        .collect();

    Ok(ok(AdminConfigurationView {
        id: config.id,
        affiliation: config.affiliation,
        payment_gateway,
    }))
}

/// Organization accounts still waiting for approval
pub async fn list_approvals(State(state): State<AppState>, auth: AuthUser) -> Result<ApiResponse<Vec<UserInformation>>> {
    let caller = auth.require(&[UserTitle::Admin])?;
    let users = state.db.users.list_unproven_by_affiliation(&caller.email).await?;
    Ok(ok(users.iter().map(|user| user_view(&state, user)).collect()))
}

#[derive(Debug, Deserialize)]
pub struct ApproveForm {
    pub email: String,
}

pub async fn approve(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(form): ValidJson<ApproveForm>,
) -> Result<ApiResponse<String>> {
    let caller = auth.require(&[UserTitle::Admin])?;
    let email = normalize_email(&form.email);

    let organization = state
        .db
        .users
        .find_affiliated(&email, &caller.email)
        .await?
        .ok_or_else(|| AppError::forbidden("organization account can only approve by their affiliation"))?;

    let certification = state
        .db
        .organizations
        .find_certification(&organization.email)
        .await?
        .ok_or_else(|| AppError::not_found("organization account certification not found"))?;
    certification.ensure_in_place()?;

    state
        .db
        .users
        .update(
            organization.id,
            UpdateUserRequest {
                proven: Some(true),
                status: Some(UserStatus::Active),
                ..Default::default()
            },
        )
        .await?;

    log_admin_action(&caller.email, "approve_organization", Some(&organization.email), None);
    Ok(ok(format!("{} approved successfully", organization.email)))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyRequestView {
    #[serde(flatten)]
    pub request: UserModifyRequest,
    pub current_name: Option<String>,
}

pub async fn list_modify_requests(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<ApiResponse<Vec<ModifyRequestView>>> {
    let caller = auth.require(&[UserTitle::Admin])?;
    let requests = state.db.modify_requests.list_open(&caller.email).await?;

    let mut views = Vec::with_capacity(requests.len());
    for request in requests {
        let current_name = state
            .db
            .users
            .find_by_email(&request.email)
            .await?
            .map(|user| user.name);
        views.push(ModifyRequestView { request, current_name });
    }

    Ok(ok(views))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewForm {
    pub request_id: Uuid,
    pub result: bool,
}

pub async fn review_modify_request(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(form): ValidJson<ReviewForm>,
) -> Result<ApiResponse<&'static str>> {
    let caller = auth.require(&[UserTitle::Admin])?;

    let request = state
        .db
        .modify_requests
        .find_by_id(form.request_id)
        .await?
        .ok_or_else(|| AppError::not_found("modify request not exist"))?;
    let user = state
        .db
        .users
        .find_by_email(&request.email)
        .await?
        .ok_or_else(|| AppError::not_found("user not exist"))?;
    request.ensure_open()?;

    if form.result {
        state
            .db
            .users
            .update(
                user.id,
                UpdateUserRequest {
                    name: Some(request.name.clone()),
                    ..Default::default()
                },
            )
            .await?;
    }
    state
        .db
        .modify_requests
        .close(request.id, UserModifyRequest::closing_status(form.result))
        .await?;

    log_admin_action(
        &caller.email,
        "review_modify_request",
        Some(&user.email),
        Some(if form.result { "executed" } else { "rejected" }),
    );
    Ok(ok("user information update successfully"))
}
