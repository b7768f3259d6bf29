//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::common::FileObject;
use crate::utils::errors::{AppError, Result};
use crate::utils::helpers::title_case;

pub const DEFAULT_AVATAR_PATH: &str = "account-avatar/default.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_title", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum UserTitle {
    Admin,
    Organization,
    Team,
    Volunteer,
    Buyer,
    Seller,
}

impl UserTitle {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserTitle::Admin => "ADMIN",
            UserTitle::Organization => "ORGANIZATION",
            UserTitle::Team => "TEAM",
            UserTitle::Volunteer => "VOLUNTEER",
            UserTitle::Buyer => "BUYER",
            UserTitle::Seller => "SELLER",
        }
    }

    /// `Organization`, as shown to clients and used in storage paths
    pub fn display_name(&self) -> String {
        title_case(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "user_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    NeedsApproval,
    Active,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "user_modify_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserModifyStatus {
    #[default]
    Pending,
    Executed,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub username: String,
    pub title: UserTitle,
    pub status: UserStatus,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub affiliation: Option<String>,
    pub sso_uid: Option<String>,
    pub avatar: Json<FileObject>,
    pub proven: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public view of a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserInformation {
    pub email: String,
    pub name: String,
    pub username: String,
    pub title: String,
    pub affiliation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proven: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl User {
    pub fn information(&self) -> UserInformation {
        UserInformation {
            email: self.email.clone(),
            name: self.name.clone(),
            username: self.username.clone(),
            title: self.title.display_name(),
            affiliation: self.affiliation.clone(),
            proven: (self.title == UserTitle::Organization).then_some(self.proven),
            status: Some(self.status),
            avatar: None,
        }
    }

    pub fn has_title(&self, allowed: &[UserTitle]) -> bool {
        allowed.contains(&self.title)
    }

    /// Target status of an enable/disable request.
    ///
    /// Accounts still waiting for approval cannot be toggled, and a toggle to
    /// the current state is refused.
    pub fn status_change(&self, enable: bool) -> Result<UserStatus> {
        match (self.status, enable) {
            (UserStatus::NeedsApproval, _) => Err(AppError::forbidden("user needs approval first")),
            (UserStatus::Active, true) => Err(AppError::forbidden("user already in enabled")),
            (UserStatus::Disabled, false) => Err(AppError::forbidden("user already in disabled")),
            (_, true) => Ok(UserStatus::Active),
            (_, false) => Ok(UserStatus::Disabled),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub username: String,
    pub title: UserTitle,
    pub status: UserStatus,
    pub password_hash: Option<String>,
    pub affiliation: Option<String>,
    pub sso_uid: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub username: Option<String>,
    pub status: Option<UserStatus>,
    pub proven: Option<bool>,
    pub email_verified: Option<bool>,
}

/// Pending change of a user's name awaiting administrator review
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserModifyRequest {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub affiliation: String,
    pub status: UserModifyStatus,
    pub closed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserModifyRequest {
    pub fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(AppError::forbidden("modify request already closed"));
        }
        Ok(())
    }

    pub fn closing_status(approved: bool) -> UserModifyStatus {
        if approved {
            UserModifyStatus::Executed
        } else {
            UserModifyStatus::Rejected
        }
    }
}
