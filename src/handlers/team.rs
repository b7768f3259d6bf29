//! Fundraising teams of an organization

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handlers::extract::{ValidJson, ValidQuery};
use crate::handlers::user_view;
use crate::middleware::auth::AuthUser;
use crate::models::user::{UserInformation, UserTitle};
use crate::response::{ok, ApiResponse};
use crate::state::AppState;
use crate::utils::errors::{AppError, Result};
use crate::utils::logging::log_user_action;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_teams).post(create_team))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeamForm {
    pub name: String,
    pub event_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTeam {
    pub ok: bool,
    pub team_id: Uuid,
}

pub async fn create_team(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(form): ValidJson<CreateTeamForm>,
) -> Result<ApiResponse<CreatedTeam>> {
    let caller = auth.require(&[UserTitle::Organization])?;

    if state.db.users.name_exists(&form.name).await? {
        return Err(AppError::operating_failed("team name already exists"));
    }
    if state.db.events.find_by_id(form.event_id).await?.is_none() {
        return Err(AppError::not_found("event not exist"));
    }

    let team = state.db.create_team(caller, &form.name, form.event_id).await?;

    log_user_action(&caller.email, "create_team", Some(&team.name));
    Ok(ok(CreatedTeam { ok: true, team_id: team.id }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamQuery {
    pub event_id: Option<Uuid>,
}

pub async fn list_teams(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidQuery(query): ValidQuery<TeamQuery>,
) -> Result<ApiResponse<Vec<UserInformation>>> {
    let caller = auth.require(&[UserTitle::Organization])?;
    let teams = state.db.users.list_teams(&caller.email, query.event_id).await?;
    Ok(ok(teams.iter().map(|team| user_view(&state, team)).collect()))
}
