//! Volunteer model
//!
//! A VOLUNTEER user is affiliated to the team it fundraises with (the team's
//! email). Contact details live in a separate configuration row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::common::FileObject;
use crate::models::user::{User, UserTitle};
use crate::utils::helpers::normalize_email;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VolunteerConfiguration {
    pub id: Uuid,
    pub volunteer_id: Uuid,
    pub phone_number: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A volunteer joined with its team and phone number
#[derive(Debug, Clone, FromRow)]
pub struct VolunteerRecord {
    pub name: String,
    pub username: String,
    pub email: String,
    pub avatar: Json<FileObject>,
    pub created_at: DateTime<Utc>,
    pub team_name: String,
    pub team_avatar: Json<FileObject>,
    pub phone_number: String,
}

/// Volunteer listing conditions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolunteerFilter {
    /// Matched against name, username and email
    pub keyword: Option<String>,
    /// Email of the team the volunteers belong to
    pub screening: Option<String>,
    pub event_id: Option<Uuid>,
    /// Organization owning the teams
    pub organization: Option<String>,
    /// Administrator the owning organization is affiliated to
    pub administrator: Option<String>,
}

impl VolunteerFilter {
    pub fn new(keyword: &str, screening: &str, event_id: Option<Uuid>) -> Self {
        let keyword = keyword.trim();
        let screening = screening.trim();
        Self {
            keyword: (!keyword.is_empty()).then(|| keyword.to_string()),
            screening: (!screening.is_empty()).then(|| normalize_email(screening)),
            event_id,
            ..Default::default()
        }
    }

    /// Restrict the listing to what `caller` may see.
    ///
    /// Administrators see their organizations' volunteers, organizations
    /// their teams' volunteers, and a team only its own.
    pub fn scoped_to(mut self, caller: &User) -> Self {
        match caller.title {
            UserTitle::Admin => self.administrator = Some(caller.email.clone()),
            UserTitle::Organization => self.organization = Some(caller.email.clone()),
            _ => self.screening = Some(caller.email.clone()),
        }
        self
    }

    /// `ILIKE` pattern for the keyword; `%`, `_` and `\` in it match literally
    pub fn keyword_pattern(&self) -> Option<String> {
        self.keyword.as_ref().map(|keyword| {
            let mut pattern = String::with_capacity(keyword.len() + 2);
            pattern.push('%');
            for c in keyword.chars() {
                if matches!(c, '%' | '_' | '\\') {
                    pattern.push('\\');
                }
                pattern.push(c);
            }
            pattern.push('%');
            pattern
        })
    }
}
