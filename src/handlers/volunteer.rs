//! Volunteer listing

use axum::extract::State;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handlers::extract::ValidQuery;
use crate::middleware::auth::AuthUser;
use crate::models::user::UserTitle;
use crate::models::volunteer::{VolunteerFilter, VolunteerRecord};
use crate::response::{ok, ApiResponse, PageQuery};
use crate::state::AppState;
use crate::utils::errors::Result;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_volunteers))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolunteerQuery {
    pub event_id: Option<Uuid>,
    #[serde(default)]
    pub keyword: String,
    /// Team email
    #[serde(default)]
    pub screening: String,
    pub page_no: Option<i64>,
    pub page_size: Option<i64>,
}

impl VolunteerQuery {
    fn page(&self) -> PageQuery {
        let defaults = PageQuery::default();
        PageQuery {
            page_no: self.page_no.unwrap_or(defaults.page_no),
            page_size: self.page_size.unwrap_or(defaults.page_size),
        }
        .normalized()
    }
}

#[derive(Debug, Serialize)]
pub struct VolunteerTeam {
    pub name: String,
    pub avatar: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolunteerItem {
    pub name: String,
    pub username: String,
    pub email: String,
    pub avatar: String,
    pub team: VolunteerTeam,
    /// Milliseconds since the epoch
    pub register_date: i64,
    pub phone_number: String,
}

impl VolunteerItem {
    fn new(record: VolunteerRecord, access_url: impl Fn(&str) -> String) -> Self {
        Self {
            avatar: access_url(&record.avatar.file_path),
            team: VolunteerTeam {
                avatar: access_url(&record.team_avatar.file_path),
                name: record.team_name,
            },
            register_date: record.created_at.timestamp_millis(),
            name: record.name,
            username: record.username,
            email: record.email,
            phone_number: record.phone_number,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolunteerList {
    pub volunteer_list: Vec<VolunteerItem>,
    pub total: i64,
}

pub async fn list_volunteers(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidQuery(query): ValidQuery<VolunteerQuery>,
) -> Result<ApiResponse<VolunteerList>> {
    let caller = auth.require(&[UserTitle::Admin, UserTitle::Organization, UserTitle::Team])?;
    let filter = VolunteerFilter::new(&query.keyword, &query.screening, query.event_id).scoped_to(caller);
    let page = query.page();

    let total = state.db.volunteers.count(&filter).await?;
    let records = state.db.volunteers.list(&filter, page.limit(), page.offset()).await?;

    Ok(ok(VolunteerList {
        volunteer_list: records
            .into_iter()
            .map(|record| VolunteerItem::new(record, |path| state.access_url(path)))
            .collect(),
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sqlx::types::Json;

    use crate::models::common::FileObject;

    #[test]
    fn test_query_page_defaults_and_bounds() {
        let query: VolunteerQuery = serde_json::from_value(serde_json::json!({})).unwrap();
        let page = query.page();
        assert_eq!((page.page_no, page.page_size), (1, 10));

        let query: VolunteerQuery =
            serde_json::from_value(serde_json::json!({ "pageNo": 3, "pageSize": 500, "keyword": "ann" })).unwrap();
        let page = query.page();
        assert_eq!((page.page_no, page.page_size), (3, 100));
        assert_eq!(page.offset(), 200);
    }

    #[test]
    fn test_item_shape() {
        let record = VolunteerRecord {
            name: "Ann Lee".to_string(),
            username: "ann".to_string(),
            email: "ann@example.com".to_string(),
            avatar: Json(FileObject::png("account-avatar/ann.png")),
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            team_name: "Runners".to_string(),
            team_avatar: Json(FileObject::png("account-avatar/default.png")),
            phone_number: "+852 5555 0101".to_string(),
        };

        let item = VolunteerItem::new(record, |path| format!("https://cdn.example.com/{}", path));
        let value = serde_json::to_value(&item).unwrap();

        assert_eq!(value["registerDate"], 1_709_251_200_000_i64);
        assert_eq!(value["phoneNumber"], "+852 5555 0101");
        assert_eq!(value["team"]["name"], "Runners");
        assert_eq!(value["team"]["avatar"], "https://cdn.example.com/account-avatar/default.png");
        assert_eq!(value["avatar"], "https://cdn.example.com/account-avatar/ann.png");
        assert!(value.get("amount").is_none());
    }
}
