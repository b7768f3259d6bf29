//! Organization repository implementation
//!
//! Covers the per-organization payment configuration and the
//! certification documents submitted at registration.

use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::common::FileObject;
use crate::models::organization::{
    OrganizationCertification, OrganizationConfiguration, OrganizationDocument, OrganizationGatewayEntry,
};
use crate::models::payment::PaymentGateway;
use crate::utils::errors::Result;

const CERTIFICATION_COLUMNS: &str = "id, affiliation, identification_document, event_creation_licence_document, \
                                     business_registration_certificate, created_at, updated_at";

#[derive(Clone)]
#[derive(Debug)]
pub struct OrganizationRepository {
    pool: PgPool,
}

impl OrganizationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_configuration(&self, affiliation: &str) -> Result<Option<OrganizationConfiguration>> {
        let config = sqlx::query_as::<_, OrganizationConfiguration>(
            "SELECT id, affiliation, payment_gateway, created_at, updated_at FROM organization_configurations WHERE affiliation = $1"
        )
        .bind(affiliation)
        .fetch_optional(&self.pool)
        .await?;

        Ok(config)
    }

    /// Get the configuration, creating an empty one when missing
    pub async fn get_or_create_configuration(&self, affiliation: &str) -> Result<OrganizationConfiguration> {
        let now = Utc::now();
        let config = sqlx::query_as::<_, OrganizationConfiguration>(
            r#"
            INSERT INTO organization_configurations (id, affiliation, payment_gateway, created_at, updated_at)
            VALUES ($1, $2, '{}'::jsonb, $3, $4)
            ON CONFLICT (affiliation) DO UPDATE SET affiliation = EXCLUDED.affiliation
            RETURNING id, affiliation, payment_gateway, created_at, updated_at
            "#
        )
        .bind(Uuid::new_v4())
        .bind(affiliation)
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
        payment_gateway: &BTreeMap<PaymentGateway, OrganizationGatewayEntry>,
    ) -> Result<()> {
        sqlx::query("UPDATE organization_configurations SET payment_gateway = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(Json(payment_gateway))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn find_certification(&self, affiliation: &str) -> Result<Option<OrganizationCertification>> {
        let cert = sqlx::query_as::<_, OrganizationCertification>(&format!(
            "SELECT {} FROM organization_certifications WHERE affiliation = $1",
            CERTIFICATION_COLUMNS
        ))
        .bind(affiliation)
        .fetch_optional(&self.pool)
        .await?;

        Ok(cert)
    }

    /// Create the certification row for a new organization
    pub async fn create_certification(&self, affiliation: &str) -> Result<OrganizationCertification> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_certification(&mut conn, affiliation).await
    }

    /// Create the certification row, or return the existing one for `affiliation`
    pub async fn insert_certification(conn: &mut PgConnection, affiliation: &str) -> Result<OrganizationCertification> {
        let now = Utc::now();
        let cert = sqlx::query_as::<_, OrganizationCertification>(&format!(
            r#"
            INSERT INTO organization_certifications (id, affiliation, created_at, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (affiliation) DO UPDATE SET updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            CERTIFICATION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(affiliation)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        Ok(cert)
    }

    /// Point one document column at an uploaded object
    pub async fn set_document(
        &self,
        affiliation: &str,
        document: OrganizationDocument,
        file: FileObject,
    ) -> Result<OrganizationCertification> {
        let mut conn = self.pool.acquire().await?;
        Self::update_document(&mut conn, affiliation, document, file).await
    }

    pub async fn update_document(
        conn: &mut PgConnection,
        affiliation: &str,
        document: OrganizationDocument,
        file: FileObject,
    ) -> Result<OrganizationCertification> {
        // Column names come from a closed enum, never from input.
        let cert = sqlx::query_as::<_, OrganizationCertification>(&format!(
            r#"
            UPDATE organization_certifications
            SET {} = $2, updated_at = $3
            WHERE affiliation = $1
            RETURNING {}
            "#,
            document.key(),
            CERTIFICATION_COLUMNS
        ))
        .bind(affiliation)
        .bind(Json(file))
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;

        Ok(cert)
    }
}
