//! Team model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Links a TEAM user to the organization and event it fundraises for
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TeamConfiguration {
    pub id: Uuid,
    pub team_id: Uuid,
    pub administrator: Option<String>,
    pub organization: String,
    pub event_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
