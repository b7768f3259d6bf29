//! Fundraising events and their rendered pages

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::routing::{delete, get, post, put};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::handlers::extract::{ValidJson, ValidQuery};
use crate::middleware::auth::AuthUser;
use crate::models::event::{
    page_paths, validate_time_range, CreateEventRequest, DomainSettings, Event, EventAffiliation, EventFilter,
    EventStatus, ExpiryHandling, PosterRenderResource, UpdateEventRequest, DEFAULT_RENDER_TEMPLATE_PATH,
};
use crate::models::user::UserTitle;
use crate::response::{ok, ApiResponse, PageQuery, Pagination};
use crate::services::mail::EVENT_STATUS_CHANGED;
use crate::state::AppState;
use crate::utils::errors::{AppError, Result};
use crate::utils::helpers::normalize_email;
use crate::utils::logging::{log_admin_action, log_user_action};

const MANAGERS: [UserTitle; 2] = [UserTitle::Admin, UserTitle::Organization];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events).post(create_event).put(update_event))
        .route("/approval", post(approve_event))
        .route("/status", post(change_event_status))
        .route("/render", put(update_render_page))
        .route("/{event_id}", delete(delete_event))
        .route("/{event_id}/restore", post(restore_event))
        .route("/{event_id}/overview", get(overview))
        .route("/{event_id}/render", get(render))
        .route("/{event_id}/render/paths", get(render_paths))
        .route("/{event_id}/render/{page_id}", delete(delete_render_page))
}

async fn find_event(state: &AppState, event_id: Uuid, missing: &str) -> Result<Event> {
    state
        .db
        .events
        .find_by_id(event_id)
        .await?
        .ok_or_else(|| AppError::not_found(missing))
}

async fn read_pages(state: &AppState, resource: &PosterRenderResource) -> Result<Map<String, Value>> {
    state.services.storage_service.read_json(&resource.pages_render_path).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListQuery {
    pub email: Option<String>,
    #[serde(default)]
    pub needs_approval: bool,
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub event_id: Uuid,
    pub event_name: String,
    pub status: EventStatus,
    pub approved: bool,
    pub background: String,
    pub fundraising_amount: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub active: bool,
    pub closed: bool,
    pub prepared: bool,
}

impl EventSummary {
    fn new(state: &AppState, event: &Event, now: DateTime<Utc>) -> Self {
        Self {
            event_id: event.id,
            event_name: event.name.clone(),
            status: event.status,
            approved: event.approved,
            background: state.access_url(&event.background.file_path),
            fundraising_amount: event.fundraising_amount,
            start_time: event.start_time,
            end_time: event.end_time,
            active: event.is_active(now),
            closed: event.is_closed(now),
            prepared: event.is_prepared(now),
        }
    }
}

pub async fn list_events(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidQuery(query): ValidQuery<EventListQuery>,
    ValidQuery(page): ValidQuery<PageQuery>,
) -> Result<ApiResponse<Pagination<EventSummary>>> {
    let caller = auth.require(&MANAGERS)?;
    let page = page.normalized();

    let mut filter = EventFilter {
        needs_approval: query.needs_approval,
        title: query.title.filter(|title| !title.is_empty()),
        ..Default::default()
    };
    match caller.title {
        UserTitle::Organization => filter.creator = Some(caller.email.clone()),
        _ => {
            filter.administrator = Some(caller.email.clone());
            filter.creator = query.email.as_deref().map(normalize_email);
        }
    }

    let events = state.db.events.list(&filter, page.limit(), page.offset()).await?;
    let total = state.db.events.count(&filter).await?;

    let now = Utc::now();
    let items = events.iter().map(|event| EventSummary::new(&state, event, now)).collect();
    Ok(ok(Pagination::new(items, total, page)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventForm {
    pub name: String,
    #[serde(default)]
    pub fundraising_licence_number: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    pub event_id: Uuid,
    pub background: String,
}

pub async fn create_event(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(form): ValidJson<CreateEventForm>,
) -> Result<ApiResponse<CreatedEvent>> {
    let caller = auth.require(&[UserTitle::Organization])?;
    validate_time_range(form.start_time, form.end_time)?;

    let storage = &state.services.storage_service;
    let template: Map<String, Value> = match storage.read_json(DEFAULT_RENDER_TEMPLATE_PATH).await {
        Ok(template) => template,
        Err(AppError::NotFound(_)) => {
            warn!(path = DEFAULT_RENDER_TEMPLATE_PATH, "Render template missing, starting with no pages");
            Map::new()
        }
        Err(e) => return Err(e),
    };

    let event = state
        .db
        .events
        .create(CreateEventRequest {
            name: form.name,
            fundraising_licence_number: form.fundraising_licence_number,
            affiliation: EventAffiliation {
                creator: caller.email.clone(),
                administrator: caller.affiliation.clone(),
            },
            start_time: form.start_time,
            end_time: form.end_time,
        })
        .await?;

    let (resource, pages) = PosterRenderResource::from_template(event.id, template);
    storage.write_json(&resource.pages_render_path, &pages).await?;
    state.db.events.set_render_resource(event.id, &resource).await?;

    log_user_action(&caller.email, "create_event", Some(&event.id.to_string()));
    Ok(ok(CreatedEvent {
        event_id: event.id,
        background: state.access_url(&event.background.file_path),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventForm {
    pub event_id: Uuid,
    pub name: Option<String>,
    pub fundraising_licence_number: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub image: Option<String>,
    pub expiry_handling: Option<ExpiryHandling>,
    pub domain_settings: Option<DomainSettings>,
    /// Pages document replacing the stored one
    pub poster_render_resource: Option<Map<String, Value>>,
}

pub async fn update_event(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(form): ValidJson<UpdateEventForm>,
) -> Result<ApiResponse<&'static str>> {
    let caller = auth.require(&MANAGERS)?;
    let event = find_event(&state, form.event_id, "event not exist").await?;
    event.ensure_not_deleted()?;

    if form.start_time.is_some() || form.end_time.is_some() {
        validate_time_range(
            form.start_time.unwrap_or(event.start_time),
            form.end_time.unwrap_or(event.end_time),
        )?;
    }

    if let Some(pages) = form.poster_render_resource {
        match event.render_resource() {
            Ok(resource) => {
                state
                    .services
                    .storage_service
                    .write_json(&resource.pages_render_path, &pages)
                    .await?
            }
            Err(_) => {
                let (resource, pages) = PosterRenderResource::from_template(event.id, pages);
                state
                    .services
                    .storage_service
                    .write_json(&resource.pages_render_path, &pages)
                    .await?;
                state.db.events.set_render_resource(event.id, &resource).await?;
            }
        }
    }

    state
        .db
        .events
        .update(
            event.id,
            UpdateEventRequest {
                name: form.name,
                fundraising_licence_number: form.fundraising_licence_number,
                start_time: form.start_time,
                end_time: form.end_time,
                image: form.image,
                expiry_handling: form.expiry_handling,
                domain_settings: form.domain_settings,
            },
        )
        .await?;

    log_user_action(&caller.email, "update_event", Some(&event.id.to_string()));
    Ok(ok("event updated successfully"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<ApiResponse<&'static str>> {
    let caller = auth.require(&MANAGERS)?;
    let event = find_event(&state, event_id, "event not exist").await?;
    state.db.events.set_deleted(event.id, true).await?;

    log_user_action(&caller.email, "delete_event", Some(&event.id.to_string()));
    Ok(ok("event deleted successfully"))
}

pub async fn restore_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<ApiResponse<&'static str>> {
    let caller = auth.require(&MANAGERS)?;
    let event = find_event(&state, event_id, "event not exist").await?;
    state.db.events.set_deleted(event.id, false).await?;

    log_user_action(&caller.email, "restore_event", Some(&event.id.to_string()));
    Ok(ok("event restored successfully"))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOverview {
    pub event_id: Uuid,
    pub event_name: String,
    pub status: EventStatus,
    pub approved: bool,
    pub fundraising_amount: f64,
    pub team_count: i64,
    pub product_count: i64,
    pub active: bool,
    pub closed: bool,
    pub prepared: bool,
}

pub async fn overview(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(event_id): Path<Uuid>,
) -> Result<ApiResponse<EventOverview>> {
    let event = find_event(&state, event_id, "event not found").await?;
    let counts = state.db.event_counts(event.id).await?;
    let now = Utc::now();

    Ok(ok(EventOverview {
        event_id: event.id,
        event_name: event.name.clone(),
        status: event.status,
        approved: event.approved,
        fundraising_amount: event.fundraising_amount,
        team_count: counts.team_count,
        product_count: counts.product_count,
        active: event.is_active(now),
        closed: event.is_closed(now),
        prepared: event.is_prepared(now),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRender {
    pub event_id: Uuid,
    pub root: Value,
    pub pages: Map<String, Value>,
}

/// Site root with its icon and logo resolved to access URLs
fn public_root(state: &AppState, resource: &PosterRenderResource) -> Value {
    let mut root = resource.root.clone();
    for (key, path) in resource.root_asset_paths() {
        if let Some(slot) = root.pointer_mut(&format!("/props/{}", key)) {
            *slot = Value::String(state.access_url(&path));
        }
    }
    root
}

pub async fn render(State(state): State<AppState>, Path(event_id): Path<Uuid>) -> Result<ApiResponse<EventRender>> {
    let event = find_event(&state, event_id, "event not found").await?;
    let resource = event.render_resource()?;
    let pages = read_pages(&state, resource).await?;

    Ok(ok(EventRender {
        event_id: event.id,
        root: public_root(&state, resource),
        pages,
    }))
}

pub async fn render_paths(State(state): State<AppState>, Path(event_id): Path<Uuid>) -> Result<ApiResponse<Vec<String>>> {
    let event = find_event(&state, event_id, "event not found").await?;
    let pages = read_pages(&state, event.render_resource()?).await?;
    Ok(ok(page_paths(&pages)))
}

#[derive(Debug, Serialize)]
pub struct RenderWrite {
    pub ok: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPageForm {
    pub event_id: Uuid,
    pub page_id: String,
    pub data: Value,
    pub root: Value,
}

async fn write_pages(state: &AppState, resource: &PosterRenderResource, pages: &Map<String, Value>) -> Result<RenderWrite> {
    match state
        .services
        .storage_service
        .write_json(&resource.pages_render_path, pages)
        .await
    {
        Ok(()) => Ok(RenderWrite { ok: true }),
        Err(e) => {
            warn!(path = %resource.pages_render_path, error = %e, "Failed to write event pages");
            Err(AppError::OperatingFailed(serde_json::json!({ "ok": false })))
        }
    }
}

pub async fn update_render_page(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(form): ValidJson<RenderPageForm>,
) -> Result<ApiResponse<RenderWrite>> {
    auth.require(&MANAGERS)?;
    let event = find_event(&state, form.event_id, "event not found").await?;
    let mut resource = event.render_resource()?.clone();

    let mut pages = read_pages(&state, &resource).await?;
    pages.insert(form.page_id, form.data);

    resource.pages_render_path = PosterRenderResource::pages_path_for(event.id);
    resource.root = form.root;
    state.db.events.set_render_resource(event.id, &resource).await?;

    Ok(ok(write_pages(&state, &resource, &pages).await?))
}

pub async fn delete_render_page(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((event_id, page_id)): Path<(Uuid, String)>,
) -> Result<ApiResponse<RenderWrite>> {
    auth.require(&MANAGERS)?;
    let event = find_event(&state, event_id, "event not found").await?;
    let resource = event.render_resource()?;

    let mut pages = read_pages(&state, resource).await?;
    if pages.remove(&page_id).is_none() {
        return Err(AppError::illegal_parameters("page not exist"));
    }

    Ok(ok(write_pages(&state, resource, &pages).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalForm {
    pub event_id: Uuid,
    pub result: bool,
}

pub async fn approve_event(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(form): ValidJson<ApprovalForm>,
) -> Result<ApiResponse<&'static str>> {
    let caller = auth.require(&[UserTitle::Admin])?;
    let event = find_event(&state, form.event_id, "event not exist").await?;
    event.ensure_approval_changes(form.result)?;

    state.db.events.set_approved(event.id, form.result).await?;

    log_admin_action(
        &caller.email,
        "approve_event",
        Some(&event.id.to_string()),
        Some(if form.result { "approved" } else { "rejected" }),
    );
    Ok(ok("event application approval executed successfully"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusForm {
    pub event_id: Uuid,
    pub status: EventStatus,
    #[serde(default)]
    pub remark: String,
}

pub async fn change_event_status(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(form): ValidJson<StatusForm>,
) -> Result<ApiResponse<&'static str>> {
    let caller = auth.require(&[UserTitle::Admin])?;
    let event = find_event(&state, form.event_id, "event not exist").await?;
    event.ensure_approved()?;

    state.db.events.set_status(event.id, form.status).await?;

    let params = HashMap::from([
        ("email", event.creator().to_string()),
        ("affiliation", caller.email.clone()),
        ("event_name", event.name.clone()),
        ("change_field", "status".to_string()),
        ("reason", form.remark),
    ]);
    state
        .services
        .integration_client
        .notify(event.creator(), EVENT_STATUS_CHANGED, &params)
        .await;

    log_admin_action(&caller.email, "change_event_status", Some(&event.id.to_string()), None);
    Ok(ok("event status updated successfully"))
}
