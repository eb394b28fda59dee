//! # Variant Repository
//!
//! Database operations for product variants (sellable servings).

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::{EntityStatus, Money, ProductVariant};

/// Repository for product variant database operations.
#[derive(Debug, Clone)]
pub struct VariantRepository {
    pool: SqlitePool,
}

impl VariantRepository {
    /// Creates a new VariantRepository.
    pub fn new(pool: SqlitePool) -> Self {
        VariantRepository { pool }
    }

    /// Gets a variant by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<ProductVariant>> {
        let variant = sqlx::query_as::<_, ProductVariant>(
            r#"
            SELECT id, product_id, size_label, selling_price,
                   conversion_factor, sort_order, status, created_at
            FROM product_variants
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(variant)
    }

    /// Gets a variant by its business key (product, size label).
    pub async fn get_by_product_size(
        &self,
        product_id: &str,
        size_label: &str,
    ) -> DbResult<Option<ProductVariant>> {
        let variant = sqlx::query_as::<_, ProductVariant>(
            r#"
            SELECT id, product_id, size_label, selling_price,
                   conversion_factor, sort_order, status, created_at
            FROM product_variants
            WHERE product_id = ?1 AND size_label = ?2
            "#,
        )
        .bind(product_id)
        .bind(size_label)
        .fetch_optional(&self.pool)
        .await?;

        Ok(variant)
    }

    /// Lists active variants for a product in display order.
    pub async fn list_active_for_product(&self, product_id: &str) -> DbResult<Vec<ProductVariant>> {
        let variants = sqlx::query_as::<_, ProductVariant>(
            r#"
            SELECT id, product_id, size_label, selling_price,
                   conversion_factor, sort_order, status, created_at
            FROM product_variants
            WHERE product_id = ?1 AND status = 'active'
            ORDER BY sort_order, size_label
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(variants)
    }

    /// Inserts a new variant.
    ///
    /// ## Returns
    /// * `Ok(())` - Inserted
    /// * `Err(DbError::UniqueViolation)` - (product, size_label) already exists
    pub async fn insert(&self, variant: &ProductVariant) -> DbResult<()> {
        debug!(product_id = %variant.product_id, size = %variant.size_label, "Inserting variant");

        sqlx::query(
            r#"
            INSERT INTO product_variants (
                id, product_id, size_label, selling_price,
                conversion_factor, sort_order, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.product_id)
        .bind(&variant.size_label)
        .bind(variant.selling_price)
        .bind(variant.conversion_factor)
        .bind(variant.sort_order)
        .bind(variant.status)
        .bind(variant.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Updates the selling price.
    pub async fn update_price(&self, id: &str, selling_price: Money) -> DbResult<()> {
        debug!(id = %id, price = %selling_price, "Updating variant price");

        let result = sqlx::query("UPDATE product_variants SET selling_price = ?2 WHERE id = ?1")
            .bind(id)
            .bind(selling_price)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ProductVariant", id));
        }

        Ok(())
    }

    /// Sets the lifecycle status.
    pub async fn set_status(&self, id: &str, status: EntityStatus) -> DbResult<()> {
        debug!(id = %id, ?status, "Setting variant status");

        let result = sqlx::query("UPDATE product_variants SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ProductVariant", id));
        }

        Ok(())
    }
}
