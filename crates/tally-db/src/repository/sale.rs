//! # Sale Repository
//!
//! Database operations for sale events.
//!
//! ## Frozen Conversion
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Each sale row freezes conversion_factor and base_units at record      │
//! │  time. Recomputing a day's sales_quantity is then a single SUM over    │
//! │  base_units — no join against catalog rows that may have been edited   │
//! │  since the sale happened.                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::{Quantity, SaleEvent};

/// Repository for sale event database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale event by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SaleEvent>> {
        let sale = sqlx::query_as::<_, SaleEvent>(
            r#"
            SELECT id, variant_id, product_id, quantity, conversion_factor,
                   base_units, unit_price, original_amount,
                   discount_kind, discount_value, discount_amount, total_amount,
                   cash_amount, mobile_amount, credit_amount,
                   customer_name, discount_reason, notes,
                   sale_date, recorded_by, created_at
            FROM sale_events
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Inserts a sale event.
    pub async fn insert(&self, sale: &SaleEvent) -> DbResult<()> {
        debug!(
            variant_id = %sale.variant_id,
            quantity = %sale.quantity,
            date = %sale.sale_date,
            "Inserting sale"
        );

        sqlx::query(
            r#"
            INSERT INTO sale_events (
                id, variant_id, product_id, quantity, conversion_factor,
                base_units, unit_price, original_amount,
                discount_kind, discount_value, discount_amount, total_amount,
                cash_amount, mobile_amount, credit_amount,
                customer_name, discount_reason, notes,
                sale_date, recorded_by, created_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8,
                ?9, ?10, ?11, ?12,
                ?13, ?14, ?15,
                ?16, ?17, ?18,
                ?19, ?20, ?21
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.variant_id)
        .bind(&sale.product_id)
        .bind(sale.quantity)
        .bind(sale.conversion_factor)
        .bind(sale.base_units)
        .bind(sale.unit_price)
        .bind(sale.original_amount)
        .bind(sale.discount_kind)
        .bind(sale.discount_value)
        .bind(sale.discount_amount)
        .bind(sale.total_amount)
        .bind(sale.cash_amount)
        .bind(sale.mobile_amount)
        .bind(sale.credit_amount)
        .bind(&sale.customer_name)
        .bind(&sale.discount_reason)
        .bind(&sale.notes)
        .bind(sale.sale_date)
        .bind(&sale.recorded_by)
        .bind(sale.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Sums sold base units for a (product, date) pair.
    ///
    /// This is the recompute source for `DailySnapshot.sales_quantity` —
    /// always derived fresh from the event table, never from an
    /// accumulated counter.
    pub async fn sum_base_units_for_product_date(
        &self,
        product_id: &str,
        date: NaiveDate,
    ) -> DbResult<Quantity> {
        let total: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(base_units), 0)
            FROM sale_events
            WHERE product_id = ?1 AND sale_date = ?2
            "#,
        )
        .bind(product_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(Quantity::from_hundredths(total.unwrap_or(0)))
    }

    /// Replaces an edited sale row in full.
    ///
    /// Edits recompute every derived column (base units, amounts, payment
    /// method split), so writing the whole row keeps the repository API
    /// honest about what changed.
    pub async fn update(&self, sale: &SaleEvent) -> DbResult<()> {
        debug!(id = %sale.id, quantity = %sale.quantity, "Updating sale");

        let result = sqlx::query(
            r#"
            UPDATE sale_events
            SET quantity = ?2,
                conversion_factor = ?3,
                base_units = ?4,
                unit_price = ?5,
                original_amount = ?6,
                discount_kind = ?7,
                discount_value = ?8,
                discount_amount = ?9,
                total_amount = ?10,
                cash_amount = ?11,
                mobile_amount = ?12,
                credit_amount = ?13,
                customer_name = ?14,
                discount_reason = ?15,
                notes = ?16,
                sale_date = ?17
            WHERE id = ?1
            "#,
        )
        .bind(&sale.id)
        .bind(sale.quantity)
        .bind(sale.conversion_factor)
        .bind(sale.base_units)
        .bind(sale.unit_price)
        .bind(sale.original_amount)
        .bind(sale.discount_kind)
        .bind(sale.discount_value)
        .bind(sale.discount_amount)
        .bind(sale.total_amount)
        .bind(sale.cash_amount)
        .bind(sale.mobile_amount)
        .bind(sale.credit_amount)
        .bind(&sale.customer_name)
        .bind(&sale.discount_reason)
        .bind(&sale.notes)
        .bind(sale.sale_date)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("SaleEvent", &sale.id));
        }

        Ok(())
    }

    /// Deletes a sale event (reversal).
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting sale");

        let result = sqlx::query("DELETE FROM sale_events WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("SaleEvent", id));
        }

        Ok(())
    }

    /// Lists sales for a date (reporting surface).
    ///
    /// Payment-method splits and cost-of-goods are computable from the
    /// returned events; no aggregates are produced here.
    pub async fn list_for_date(&self, date: NaiveDate) -> DbResult<Vec<SaleEvent>> {
        let sales = sqlx::query_as::<_, SaleEvent>(
            r#"
            SELECT id, variant_id, product_id, quantity, conversion_factor,
                   base_units, unit_price, original_amount,
                   discount_kind, discount_value, discount_amount, total_amount,
                   cash_amount, mobile_amount, credit_amount,
                   customer_name, discount_reason, notes,
                   sale_date, recorded_by, created_at
            FROM sale_events
            WHERE sale_date = ?1
            ORDER BY created_at
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Lists all sales across a date range (inclusive).
    pub async fn list_for_range(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<SaleEvent>> {
        let sales = sqlx::query_as::<_, SaleEvent>(
            r#"
            SELECT id, variant_id, product_id, quantity, conversion_factor,
                   base_units, unit_price, original_amount,
                   discount_kind, discount_value, discount_amount, total_amount,
                   cash_amount, mobile_amount, credit_amount,
                   customer_name, discount_reason, notes,
                   sale_date, recorded_by, created_at
            FROM sale_events
            WHERE sale_date >= ?1 AND sale_date <= ?2
            ORDER BY sale_date, created_at
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Lists sales for a product across a date range (inclusive).
    pub async fn list_for_product_range(
        &self,
        product_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<SaleEvent>> {
        let sales = sqlx::query_as::<_, SaleEvent>(
            r#"
            SELECT id, variant_id, product_id, quantity, conversion_factor,
                   base_units, unit_price, original_amount,
                   discount_kind, discount_value, discount_amount, total_amount,
                   cash_amount, mobile_amount, credit_amount,
                   customer_name, discount_reason, notes,
                   sale_date, recorded_by, created_at
            FROM sale_events
            WHERE product_id = ?1 AND sale_date >= ?2 AND sale_date <= ?3
            ORDER BY sale_date, created_at
            "#,
        )
        .bind(product_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Counts sales referencing a variant (dependent-records guard).
    pub async fn count_for_variant(&self, variant_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sale_events WHERE variant_id = ?1")
                .bind(variant_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Counts sales referencing a product (dependent-records guard).
    pub async fn count_for_product(&self, product_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sale_events WHERE product_id = ?1")
                .bind(product_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
