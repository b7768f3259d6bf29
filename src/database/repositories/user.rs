//! User repository implementation

use chrono::Utc;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::common::FileObject;
use crate::models::user::{
    CreateUserRequest, UpdateUserRequest, User, UserModifyRequest, UserModifyStatus, UserTitle,
};
use crate::utils::errors::Result;

const USER_COLUMNS: &str = "id, email, name, username, title, status, password_hash, affiliation, sso_uid, \
                            avatar, proven, email_verified, created_at, updated_at";

#[derive(Clone)]
#[derive(Debug)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user
    pub async fn create(&self, request: CreateUserRequest) -> Result<User> {
        let mut conn = self.pool.acquire().await?;
        Self::insert(&mut conn, Uuid::new_v4(), request).await
    }

    /// Insert a user on an existing connection or transaction
    pub async fn insert(conn: &mut PgConnection, id: Uuid, request: CreateUserRequest) -> Result<User> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, name, username, title, status, password_hash, affiliation, sso_uid,
                               avatar, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(request.email.to_lowercase())
        .bind(request.name)
        .bind(request.username)
        .bind(request.title)
        .bind(request.status)
        .bind(request.password_hash)
        .bind(request.affiliation)
        .bind(request.sso_uid)
        .bind(Json(FileObject::png(crate::models::user::DEFAULT_AVATAR_PATH)))
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(user)
    }

    /// Find user by ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Find user by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS))
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Find user by SSO subject
    pub async fn find_by_sso_uid(&self, sso_uid: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE sso_uid = $1", USER_COLUMNS))
            .bind(sso_uid)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Find a user with the given affiliation
    pub async fn find_affiliated(&self, email: &str, affiliation: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1 AND affiliation = $2",
            USER_COLUMNS
        ))
        .bind(email.to_lowercase())
        .bind(affiliation)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Oldest user holding a title
    pub async fn find_first_by_title(&self, title: UserTitle) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE title = $1 ORDER BY created_at ASC LIMIT 1",
            USER_COLUMNS
        ))
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// List users holding a title
    pub async fn list_by_title(&self, title: UserTitle) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE title = $1 ORDER BY created_at ASC",
            USER_COLUMNS
        ))
        .bind(title)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// List users affiliated to an account with pagination
    pub async fn list_by_affiliation(&self, affiliation: &str, limit: i64, offset: i64) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE affiliation = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
            USER_COLUMNS
        ))
        .bind(affiliation)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Count users affiliated to an account
    pub async fn count_by_affiliation(&self, affiliation: &str) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE affiliation = $1")
            .bind(affiliation)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    /// Organization accounts awaiting approval by an administrator
    pub async fn list_unproven_by_affiliation(&self, affiliation: &str) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE affiliation = $1 AND proven = FALSE ORDER BY created_at ASC",
            USER_COLUMNS
        ))
        .bind(affiliation)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Teams owned by an organization
    pub async fn list_teams(&self, organization: &str, event_id: Option<Uuid>) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            WHERE u.title = 'TEAM' AND u.affiliation = $1
              AND ($2::uuid IS NULL OR EXISTS (
                  SELECT 1 FROM team_configurations t WHERE t.team_id = u.id AND t.event_id = $2
              ))
            ORDER BY u.created_at ASC
            "#
        )
        .bind(organization)
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    /// Whether any account already uses this name
    pub async fn name_exists(&self, name: &str) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE name = $1)")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;

        Ok(exists.0)
    }

    /// Update user
    pub async fn update(&self, id: Uuid, request: UpdateUserRequest) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                username = COALESCE($3, username),
                status = COALESCE($4, status),
                proven = COALESCE($5, proven),
                email_verified = COALESCE($6, email_verified),
                updated_at = $7
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(request.name)
        .bind(request.username)
        .bind(request.status)
        .bind(request.proven)
        .bind(request.email_verified)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Replace the stored password hash
    pub async fn set_password_hash(&self, id: Uuid, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Point the avatar at a new object
    pub async fn set_avatar(&self, id: Uuid, avatar: FileObject) -> Result<()> {
        sqlx::query("UPDATE users SET avatar = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(Json(avatar))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Delete user
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Repository for pending user information changes
#[derive(Clone)]
#[derive(Debug)]
pub struct ModifyRequestRepository {
    pool: PgPool,
}

impl ModifyRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a request to rename a user
    pub async fn create(&self, email: &str, name: &str, affiliation: &str) -> Result<UserModifyRequest> {
        let now = Utc::now();
        let request = sqlx::query_as::<_, UserModifyRequest>(
            r#"
            INSERT INTO user_modify_requests (id, email, name, affiliation, status, closed, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'pending', FALSE, $5, $6)
            RETURNING id, email, name, affiliation, status, closed, created_at, updated_at
            "#
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(name)
        .bind(affiliation)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(request)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<UserModifyRequest>> {
        let request = sqlx::query_as::<_, UserModifyRequest>(
            "SELECT id, email, name, affiliation, status, closed, created_at, updated_at FROM user_modify_requests WHERE id = $1"
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    /// Open requests addressed to an administrator
    pub async fn list_open(&self, affiliation: &str) -> Result<Vec<UserModifyRequest>> {
        let requests = sqlx::query_as::<_, UserModifyRequest>(
            r#"
            SELECT id, email, name, affiliation, status, closed, created_at, updated_at
            FROM user_modify_requests
            WHERE affiliation = $1 AND closed = FALSE
            ORDER BY created_at ASC
            "#
        )
        .bind(affiliation)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    /// Close a request with its outcome
    pub async fn close(&self, id: Uuid, status: UserModifyStatus) -> Result<()> {
        sqlx::query("UPDATE user_modify_requests SET status = $2, closed = TRUE, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(status)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
