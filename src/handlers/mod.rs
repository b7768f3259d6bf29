//! HTTP handlers
//!
//! One module per route group. Handlers authenticate through the extractors
//! in [`crate::middleware::auth`], check the title allow-list, do their store
//! or upstream work and answer with the response envelope.

pub mod admin;
pub mod common;
pub mod events;
pub mod extract;
pub mod organization;
pub mod payment;
pub mod root;
pub mod settings;
pub mod sso;
pub mod team;
pub mod volunteer;

use std::collections::HashMap;

use axum::Router;
use serde::Serialize;

use crate::models::user::{User, UserInformation};
use crate::services::mail::CERTIFICATION_READY;
use crate::services::storage::checksum;
use crate::state::AppState;

/// Every route of the API
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(root::router())
        .nest("/common", common::router())
        .nest("/settings", settings::router())
        .nest("/admin", admin::router())
        .nest("/organization", organization::router())
        .nest("/events", events::router())
        .nest("/payment", payment::router())
        .nest("/team", team::router())
        .nest("/volunteer", volunteer::router())
        .nest("/sso", sso::router())
}

/// Public view of a user with a signed avatar URL
pub(crate) fn user_view(state: &AppState, user: &User) -> UserInformation {
    let mut info = user.information();
    info.avatar = Some(state.access_url(&user.avatar.file_path));
    info
}

/// Tell the approving administrator that an organization is ready for review
pub(crate) async fn notify_certification_ready(state: &AppState, affiliation: &str, name: &str) {
    let params = HashMap::from([("affiliation", affiliation.to_string()), ("name", name.to_string())]);
    state
        .services
        .integration_client
        .notify(affiliation, CERTIFICATION_READY, &params)
        .await;
}

/// Answer to a file upload
#[derive(Debug, Serialize)]
pub struct UploadResult {
    pub message: String,
    pub checksum: String,
}

impl UploadResult {
    pub fn new(message: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            message: message.into(),
            checksum: checksum(bytes),
        }
    }
}
