//! Payment product repository implementation

use chrono::Utc;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::common::FileObject;
use crate::models::payment::{CreateProductRequest, PaymentProduct, UpdateProductRequest};
use crate::utils::errors::Result;

const PRODUCT_COLUMNS: &str = "id, name, brief_description, detailed_description, images, stocks, options, \
                               affiliation, created_at, updated_at";

#[derive(Clone)]
#[derive(Debug)]
pub struct PaymentProductRepository {
    pool: PgPool,
}

impl PaymentProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a product without images
    pub async fn create(&self, request: CreateProductRequest) -> Result<PaymentProduct> {
        let now = Utc::now();
        let product = sqlx::query_as::<_, PaymentProduct>(&format!(
            r#"
            INSERT INTO payment_products (id, name, brief_description, detailed_description, images, stocks, options,
                                          affiliation, created_at, updated_at)
            VALUES ($1, $2, $3, $4, '[]'::jsonb, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(request.name)
        .bind(request.brief_description)
        .bind(request.detailed_description)
        .bind(request.stocks)
        .bind(Json(request.options))
        .bind(Json(request.affiliation))
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(product)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<PaymentProduct>> {
        let product = sqlx::query_as::<_, PaymentProduct>(&format!(
            "SELECT {} FROM payment_products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Fetch several products, in no particular order
    pub async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<PaymentProduct>> {
        let products = sqlx::query_as::<_, PaymentProduct>(&format!(
            "SELECT {} FROM payment_products WHERE id = ANY($1)",
            PRODUCT_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Products of a creator, optionally bound to one target
    pub async fn list_by_creator(&self, creator: &str, bind_id: Option<&str>) -> Result<Vec<PaymentProduct>> {
        let products = sqlx::query_as::<_, PaymentProduct>(&format!(
            r#"
            SELECT {} FROM payment_products
            WHERE affiliation->>'creator' = $1
              AND ($2::text IS NULL OR affiliation->>'bindId' = $2)
            ORDER BY created_at ASC
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(creator)
        .bind(bind_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Update text fields, stocks and options
    pub async fn update(&self, id: Uuid, request: UpdateProductRequest) -> Result<PaymentProduct> {
        let product = sqlx::query_as::<_, PaymentProduct>(&format!(
            r#"
            UPDATE payment_products
            SET name = COALESCE($2, name),
                brief_description = COALESCE($3, brief_description),
                detailed_description = COALESCE($4, detailed_description),
                stocks = COALESCE($5, stocks),
                options = COALESCE($6, options),
                updated_at = $7
            WHERE id = $1
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(request.name)
        .bind(request.brief_description)
        .bind(request.detailed_description)
        .bind(request.stocks)
        .bind(request.options.map(Json))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(product)
    }

    /// Replace the image list
    pub async fn set_images(&self, id: Uuid, images: &[FileObject]) -> Result<()> {
        sqlx::query("UPDATE payment_products SET images = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(Json(images))
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
