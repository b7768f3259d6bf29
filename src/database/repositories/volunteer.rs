//! Volunteer repository implementation

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::volunteer::{VolunteerConfiguration, VolunteerFilter, VolunteerRecord};
use crate::utils::errors::Result;

/// Volunteers with their team, owning organization and configuration.
///
/// Binds: $1 keyword pattern, $2 team email, $3 event, $4 organization, $5 administrator.
const VOLUNTEER_SOURCE: &str = r#"
    FROM users v
    JOIN users t ON t.email = v.affiliation AND t.title = 'TEAM'
    JOIN users o ON o.email = t.affiliation
    JOIN volunteer_configurations c ON c.volunteer_id = v.id
    WHERE v.title = 'VOLUNTEER'
      AND ($1::text IS NULL OR v.name ILIKE $1 OR v.username ILIKE $1 OR v.email ILIKE $1)
      AND ($2::text IS NULL OR v.affiliation = $2)
      AND ($3::uuid IS NULL OR EXISTS (
          SELECT 1 FROM team_configurations tc WHERE tc.team_id = t.id AND tc.event_id = $3
      ))
      AND ($4::text IS NULL OR t.affiliation = $4)
      AND ($5::text IS NULL OR o.affiliation = $5)
"#;

#[derive(Clone)]
#[derive(Debug)]
pub struct VolunteerRepository {
    pool: PgPool,
}

impl VolunteerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record or replace a volunteer's phone number
    pub async fn upsert_configuration(&self, volunteer_id: Uuid, phone_number: &str) -> Result<VolunteerConfiguration> {
        let now = Utc::now();
        let config = sqlx::query_as::<_, VolunteerConfiguration>(
            r#"
            INSERT INTO volunteer_configurations (id, volunteer_id, phone_number, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (volunteer_id) DO UPDATE
            SET phone_number = EXCLUDED.phone_number, updated_at = EXCLUDED.updated_at
            RETURNING id, volunteer_id, phone_number, created_at, updated_at
            "#
        )
        .bind(Uuid::new_v4())
        .bind(volunteer_id)
        .bind(phone_number)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(config)
    }

    /// One page of volunteers, oldest registration first
    pub async fn list(&self, filter: &VolunteerFilter, limit: i64, offset: i64) -> Result<Vec<VolunteerRecord>> {
        let records = sqlx::query_as::<_, VolunteerRecord>(&format!(
            r#"
            SELECT v.name, v.username, v.email, v.avatar, v.created_at,
                   t.name AS team_name, t.avatar AS team_avatar, c.phone_number
            {}
            ORDER BY v.created_at ASC, v.id ASC
            LIMIT $6 OFFSET $7
            "#,
            VOLUNTEER_SOURCE
        ))
        .bind(filter.keyword_pattern())
        .bind(filter.screening.as_deref())
        .bind(filter.event_id)
        .bind(filter.organization.as_deref())
        .bind(filter.administrator.as_deref())
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    pub async fn count(&self, filter: &VolunteerFilter) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) {}", VOLUNTEER_SOURCE))
            .bind(filter.keyword_pattern())
            .bind(filter.screening.as_deref())
            .bind(filter.event_id)
            .bind(filter.organization.as_deref())
            .bind(filter.administrator.as_deref())
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
