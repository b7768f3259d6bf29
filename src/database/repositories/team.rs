//! Team configuration repository implementation

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::team::TeamConfiguration;
use crate::utils::errors::Result;

#[derive(Clone)]
#[derive(Debug)]
pub struct TeamRepository {
    pool: PgPool,
}

impl TeamRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attach a team user to an event
    pub async fn create(
        &self,
        team_id: Uuid,
        administrator: Option<&str>,
        organization: &str,
        event_id: Uuid,
    ) -> Result<TeamConfiguration> {
        let now = Utc::now();
        let config = sqlx::query_as::<_, TeamConfiguration>(
            r#"
            INSERT INTO team_configurations (id, team_id, administrator, organization, event_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, team_id, administrator, organization, event_id, created_at, updated_at
            "#
        )
        .bind(Uuid::new_v4())
        .bind(team_id)
        .bind(administrator)
        .bind(organization)
        .bind(event_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(config)
    }
}
