//! Health check and signed static object access

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::handlers::extract::ValidQuery;
use crate::models::common::content_type_for_path;
use crate::state::AppState;
use crate::utils::errors::{AppError, Result};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/statics/{*path}", get(statics))
}

/// Liveness check, answered without the envelope
pub async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "name": state.settings.app.name, "server": true }))
}

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub signature: String,
}

pub async fn statics(
    State(state): State<AppState>,
    Path(path): Path<String>,
    ValidQuery(query): ValidQuery<SignedQuery>,
) -> Result<Response> {
    let storage = &state.services.storage_service;
    if !storage.verify_signature(&path, query.expires, &query.signature) {
        return Err(AppError::forbidden("invalid or expired signature"));
    }

    let bytes = storage.get(&path).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for_path(&path))], bytes).into_response())
}
