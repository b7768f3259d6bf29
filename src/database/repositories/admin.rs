//! Admin repository implementation

use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::admin::{AdminConfiguration, AdminGatewayEntry, AdminRole, Administrator};
use crate::models::payment::PaymentGateway;
use crate::utils::errors::Result;

#[derive(Clone)]
#[derive(Debug)]
pub struct AdminRepository {
    pool: PgPool,
}

impl AdminRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find an Azure administrator by email
    pub async fn find_administrator(&self, email: &str) -> Result<Option<Administrator>> {
        let admin = sqlx::query_as::<_, Administrator>(
            "SELECT id, email, role, created_at, updated_at FROM administrators WHERE email = $1"
        )
        .bind(email.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(admin)
    }

    /// Register an Azure administrator
    pub async fn create_administrator(&self, email: &str, role: AdminRole) -> Result<Administrator> {
        let now = Utc::now();
        let admin = sqlx::query_as::<_, Administrator>(
            r#"
            INSERT INTO administrators (id, email, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, role, created_at, updated_at
            "#
        )
        .bind(Uuid::new_v4())
        .bind(email.to_lowercase())
        .bind(role)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(admin)
    }

    /// Get the payment configuration owned by an administrator
    pub async fn find_configuration(&self, affiliation: &str) -> Result<Option<AdminConfiguration>> {
        let config = sqlx::query_as::<_, AdminConfiguration>(
            "SELECT id, affiliation, payment_gateway, created_at, updated_at FROM admin_configurations WHERE affiliation = $1"
        )
        .bind(affiliation)
        .fetch_optional(&self.pool)
        .await?;

        Ok(config)
    }

    /// Create a configuration, keeping any row that already exists
    pub async fn create_configuration(
        &self,
        affiliation: &str,
        payment_gateway: BTreeMap<PaymentGateway, AdminGatewayEntry>,
    ) -> Result<AdminConfiguration> {
        let now = Utc::now();
        let config = sqlx::query_as::<_, AdminConfiguration>(
            r#"
            INSERT INTO admin_configurations (id, affiliation, payment_gateway, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (affiliation) DO UPDATE SET affiliation = EXCLUDED.affiliation
            RETURNING id, affiliation, payment_gateway, created_at, updated_at
            "#
        )
        .bind(Uuid::new_v4())
        .bind(affiliation)
        .bind(Json(payment_gateway))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(config)
    }

    /// Replace the gateway map
    pub async fn update_gateways(
        &self,
        id: Uuid,
        payment_gateway: &BTreeMap<PaymentGateway, AdminGatewayEntry>,
    ) -> Result<()> {
        sqlx::query("UPDATE admin_configurations SET payment_gateway = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(Json(payment_gateway))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
