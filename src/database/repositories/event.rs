//! Event repository implementation

use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::event::{
    CreateEventRequest, DomainSettings, Event, EventFilter, EventStatus, ExpiryHandling, PosterRenderResource,
    UpdateEventRequest,
};
use crate::models::common::FileObject;
use crate::utils::errors::Result;

const EVENT_COLUMNS: &str = "id, name, fundraising_licence_number, background, approved, poster_render_resource, \
                             image, affiliation, fundraising_amount, start_time, end_time, status, deleted, \
                             expiry_handling, domain_settings, created_at, updated_at";

const FILTER_CLAUSE: &str = r#"
    deleted = FALSE
    AND ($1::text IS NULL OR affiliation->>'creator' = $1)
    AND ($2::text IS NULL OR affiliation->>'administrator' = $2)
    AND (NOT $3 OR status = 'needs_approval')
    AND ($4::text IS NULL OR name ILIKE '%' || $4 || '%')
"#;

#[derive(Clone)]
#[derive(Debug)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new event
    pub async fn create(&self, request: CreateEventRequest) -> Result<Event> {
        let now = Utc::now();
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            INSERT INTO events (id, name, fundraising_licence_number, background, affiliation, start_time, end_time,
                                expiry_handling, domain_settings, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(request.name)
        .bind(request.fundraising_licence_number)
        .bind(Json(FileObject::png(crate::models::event::DEFAULT_BACKGROUND_PATH)))
        .bind(Json(request.affiliation))
        .bind(request.start_time)
        .bind(request.end_time)
        .bind(Json(ExpiryHandling::default()))
        .bind(Json(DomainSettings::default()))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    /// Find event by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(&format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(event)
    }

    /// Update event
    pub async fn update(&self, id: Uuid, request: UpdateEventRequest) -> Result<Event> {
        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE events
            SET name = COALESCE($2, name),
                fundraising_licence_number = COALESCE($3, fundraising_licence_number),
                start_time = COALESCE($4, start_time),
                end_time = COALESCE($5, end_time),
                image = COALESCE($6, image),
                expiry_handling = COALESCE($7, expiry_handling),
                domain_settings = COALESCE($8, domain_settings),
                updated_at = $9
            WHERE id = $1
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(id)
        .bind(request.name)
        .bind(request.fundraising_licence_number)
        .bind(request.start_time)
        .bind(request.end_time)
        .bind(request.image)
        .bind(request.expiry_handling.map(Json))
        .bind(request.domain_settings.map(Json))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(event)
    }

    pub async fn set_render_resource(&self, id: Uuid, resource: &PosterRenderResource) -> Result<()> {
        sqlx::query("UPDATE events SET poster_render_resource = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(Json(resource))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Soft delete or restore
    pub async fn set_deleted(&self, id: Uuid, deleted: bool) -> Result<()> {
        sqlx::query("UPDATE events SET deleted = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(deleted)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn set_approved(&self, id: Uuid, approved: bool) -> Result<()> {
        sqlx::query("UPDATE events SET approved = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(approved)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn set_status(&self, id: Uuid, status: EventStatus) -> Result<()> {
        sqlx::query("UPDATE events SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(status)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// List non-deleted events matching a filter with pagination
    pub async fn list(&self, filter: &EventFilter, limit: i64, offset: i64) -> Result<Vec<Event>> {
        let events = sqlx::query_as::<_, Event>(&format!(
            "SELECT {} FROM events WHERE {} ORDER BY created_at DESC LIMIT $5 OFFSET $6",
            EVENT_COLUMNS, FILTER_CLAUSE
        ))
        .bind(filter.creator.as_deref())
        .bind(filter.administrator.as_deref())
        .bind(filter.needs_approval)
        .bind(filter.title.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }

    /// Count non-deleted events matching a filter
    pub async fn count(&self, filter: &EventFilter) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM events WHERE {}", FILTER_CLAUSE))
            .bind(filter.creator.as_deref())
            .bind(filter.administrator.as_deref())
            .bind(filter.needs_approval)
            .bind(filter.title.as_deref())
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    /// Number of teams fundraising for an event
    pub async fn team_count(&self, id: Uuid) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM team_configurations WHERE event_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    /// Number of products bound to an event
    pub async fn product_count(&self, id: Uuid) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM payment_products WHERE affiliation->>'bindId' = $1 AND affiliation->>'bindType' = 'event'"
        )
        .bind(id.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }
}
