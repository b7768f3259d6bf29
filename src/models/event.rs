//! Event model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::common::FileObject;
use crate::utils::errors::{AppError, Result};

pub const DEFAULT_BACKGROUND_PATH: &str = "org-events/default.png";
pub const DEFAULT_RENDER_TEMPLATE_PATH: &str = "org-events/render/templates/default.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "event_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    NeedsApproval,
    Ongoing,
    Paused,
    Closed,
    Deprecated,
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryHandlingMode {
    #[default]
    Close,
    Redirect,
    KeepActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DomainMode {
    #[default]
    None,
    Platform,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventAffiliation {
    pub creator: String,
    pub administrator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryHandling {
    pub expiry_handling_mode: ExpiryHandlingMode,
    #[serde(default)]
    pub redirect_url: String,
    #[serde(default)]
    pub keep_active_dialog_content: String,
    #[serde(default)]
    pub keep_active_allow_user_register: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSettings {
    pub domain_mode: DomainMode,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_sub_domain")]
    pub sub_domain: String,
    #[serde(default)]
    pub rule_id: String,
}

fn default_sub_domain() -> String {
    "www".to_string()
}

impl Default for DomainSettings {
    fn default() -> Self {
        Self {
            domain_mode: DomainMode::None,
            domain: String::new(),
            sub_domain: default_sub_domain(),
            rule_id: String::new(),
        }
    }
}

/// Where an event's page documents live, plus the shared site root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosterRenderResource {
    pub pages_render_path: String,
    pub root: Value,
}

impl PosterRenderResource {
    pub fn pages_path_for(event_id: Uuid) -> String {
        format!("org-events/render/{}.json", event_id)
    }

    /// Root used when the page template carries none
    pub fn default_root() -> Value {
        json!({
            "props": {
                "title": "New Page",
                "icon": "org-events/logos/frsaas.ico",
                "logo": "org-events/logos/frsaas.png",
                "items": [
                    { "en": "Home", "hk": "首頁", "cn": "首页", "pathname": "/", "hidden": "N" },
                    { "en": "Products", "hk": "產品", "cn": "产品", "pathname": "/products", "hidden": "N" },
                    { "en": "Contact", "hk": "聯絡我們", "cn": "联系我们", "pathname": "/contact", "hidden": "N" },
                    { "en": "About", "hk": "關於我們", "cn": "关于我们", "pathname": "/about", "hidden": "N" }
                ],
                "description": { "en": "This is a new page", "hk": "這是一個新頁面", "cn": "这是一个新页面" },
                "copyright": { "en": "Copyright © 2024", "hk": "版權所有 © 2024", "cn": "版权所有 © 2024" }
            }
        })
    }

    /// Split a page template into its root and the remaining pages.
    ///
    /// The template's own root wins over the default one.
    pub fn from_template(event_id: Uuid, mut template: Map<String, Value>) -> (Self, Map<String, Value>) {
        let root = template
            .remove("root")
            .filter(|root| !root.is_null())
            .unwrap_or_else(Self::default_root);
        let resource = Self {
            pages_render_path: Self::pages_path_for(event_id),
            root,
        };
        (resource, template)
    }

    /// Storage paths referenced by `root.props.icon` and `root.props.logo`
    pub fn root_asset_paths(&self) -> Vec<(&'static str, String)> {
        ["icon", "logo"]
            .into_iter()
            .filter_map(|key| {
                self.root
                    .pointer(&format!("/props/{}", key))
                    .and_then(Value::as_str)
                    .map(|path| (key, path.to_string()))
            })
            .collect()
    }
}

/// Pathnames of every page in a pages document
pub fn page_paths(pages: &Map<String, Value>) -> Vec<String> {
    pages
        .values()
        .map(|page| {
            page.get("pathname")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub fundraising_licence_number: String,
    pub background: Json<FileObject>,
    pub approved: bool,
    pub poster_render_resource: Option<Json<PosterRenderResource>>,
    pub image: String,
    pub affiliation: Json<EventAffiliation>,
    pub fundraising_amount: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: EventStatus,
    pub deleted: bool,
    pub expiry_handling: Json<ExpiryHandling>,
    pub domain_settings: Json<DomainSettings>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// Running right now
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.start_time < now && now < self.end_time && self.status == EventStatus::Ongoing
    }

    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        now > self.end_time && matches!(self.status, EventStatus::Ongoing | EventStatus::Closed)
    }

    /// Approved to run but not started yet
    pub fn is_prepared(&self, now: DateTime<Utc>) -> bool {
        now < self.start_time && self.status == EventStatus::Ongoing
    }

    pub fn creator(&self) -> &str {
        &self.affiliation.creator
    }

    pub fn ensure_not_deleted(&self) -> Result<()> {
        if self.deleted {
            return Err(AppError::forbidden("event already deleted, please restore it first"));
        }
        Ok(())
    }

    /// Status toggles are only allowed after approval
    pub fn ensure_approved(&self) -> Result<()> {
        if !self.approved {
            return Err(AppError::forbidden("event application has not been approved"));
        }
        Ok(())
    }

    /// An approval decision must change the current value
    pub fn ensure_approval_changes(&self, result: bool) -> Result<()> {
        if self.approved == result {
            return Err(AppError::forbidden("event application already approved or rejected"));
        }
        Ok(())
    }

    pub fn render_resource(&self) -> Result<&PosterRenderResource> {
        self.poster_render_resource
            .as_ref()
            .map(|json| &json.0)
            .ok_or_else(|| AppError::not_found("event render resource not found"))
    }
}

/// End must come strictly after start
pub fn validate_time_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if end <= start {
        return Err(AppError::illegal_parameters("event end time must be later than start time"));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CreateEventRequest {
    pub name: String,
    pub fundraising_licence_number: String,
    pub affiliation: EventAffiliation,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateEventRequest {
    pub name: Option<String>,
    pub fundraising_licence_number: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub image: Option<String>,
    pub expiry_handling: Option<ExpiryHandling>,
    pub domain_settings: Option<DomainSettings>,
}

/// Filters for listing events
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub creator: Option<String>,
    pub administrator: Option<String>,
    pub needs_approval: bool,
    pub title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;

    fn event(status: EventStatus, start_offset_hours: i64, end_offset_hours: i64) -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            name: "Charity Run".to_string(),
            fundraising_licence_number: String::new(),
            background: Json(FileObject::png(DEFAULT_BACKGROUND_PATH)),
            approved: false,
            poster_render_resource: None,
            image: String::new(),
            affiliation: Json(EventAffiliation {
                creator: "org@example.com".to_string(),
                administrator: Some("admin@example.com".to_string()),
            }),
            fundraising_amount: 0.0,
            start_time: now + Duration::hours(start_offset_hours),
            end_time: now + Duration::hours(end_offset_hours),
            status,
            deleted: false,
            expiry_handling: Json(ExpiryHandling::default()),
            domain_settings: Json(DomainSettings::default()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_derived_flags() {
        let now = Utc::now();

        let running = event(EventStatus::Ongoing, -1, 1);
        assert!(running.is_active(now));
        assert!(!running.is_closed(now));
        assert!(!running.is_prepared(now));

        let upcoming = event(EventStatus::Ongoing, 1, 2);
        assert!(upcoming.is_prepared(now));
        assert!(!upcoming.is_active(now));

        let finished = event(EventStatus::Closed, -3, -1);
        assert!(finished.is_closed(now));

        let paused = event(EventStatus::Paused, -3, -1);
        assert!(!paused.is_closed(now));
        assert!(!paused.is_active(now));
    }

    #[test]
    fn test_approval_rules() {
        let mut e = event(EventStatus::NeedsApproval, 1, 2);
        assert_matches!(e.ensure_approved(), Err(AppError::Forbidden(_)));
        assert_matches!(e.ensure_approval_changes(false), Err(AppError::Forbidden(_)));
        assert!(e.ensure_approval_changes(true).is_ok());

        e.approved = true;
        assert!(e.ensure_approved().is_ok());
        assert!(e.ensure_approval_changes(true).is_err());
    }

    #[test]
    fn test_deleted_event_is_locked() {
        let mut e = event(EventStatus::Ongoing, 1, 2);
        assert!(e.ensure_not_deleted().is_ok());
        e.deleted = true;
        assert_matches!(e.ensure_not_deleted(), Err(AppError::Forbidden(_)));
    }

    #[test]
    fn test_time_range() {
        let now = Utc::now();
        assert!(validate_time_range(now, now + Duration::hours(1)).is_ok());
        assert_matches!(validate_time_range(now, now), Err(AppError::IllegalParameters(_)));
    }

    #[test]
    fn test_template_root_split() {
        let id = Uuid::new_v4();
        let template = json!({
            "home": { "pathname": "/", "content": [] },
            "about": { "pathname": "/about", "content": [] }
        });
        let (resource, pages) = PosterRenderResource::from_template(id, template.as_object().unwrap().clone());
        assert_eq!(resource.root, PosterRenderResource::default_root());
        assert_eq!(resource.pages_render_path, format!("org-events/render/{}.json", id));
        assert_eq!(pages.len(), 2);

        let mut paths = page_paths(&pages);
        paths.sort();
        assert_eq!(paths, vec!["/", "/about"]);

        let with_root = json!({ "root": { "props": { "title": "Custom" } }, "home": { "pathname": "/" } });
        let (resource, pages) = PosterRenderResource::from_template(id, with_root.as_object().unwrap().clone());
        assert_eq!(resource.root["props"]["title"], "Custom");
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn test_root_asset_paths() {
        let resource = PosterRenderResource {
            pages_render_path: "org-events/render/x.json".to_string(),
            root: PosterRenderResource::default_root(),
        };
        let assets = resource.root_asset_paths();
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0], ("icon", "org-events/logos/frsaas.ico".to_string()));
    }
}
