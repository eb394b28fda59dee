//! # Purchase Repository
//!
//! Database operations for stock delivery events.

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::{Money, PurchaseEvent, Quantity};

/// Repository for purchase event database operations.
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    /// Creates a new PurchaseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    /// Gets a purchase event by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<PurchaseEvent>> {
        let purchase = sqlx::query_as::<_, PurchaseEvent>(
            r#"
            SELECT id, product_id, quantity, unit_cost, total_cost,
                   purchase_date, notes, recorded_by, created_at
            FROM purchase_events
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(purchase)
    }

    /// Inserts a purchase event.
    pub async fn insert(&self, purchase: &PurchaseEvent) -> DbResult<()> {
        debug!(
            product_id = %purchase.product_id,
            quantity = %purchase.quantity,
            date = %purchase.purchase_date,
            "Inserting purchase"
        );

        sqlx::query(
            r#"
            INSERT INTO purchase_events (
                id, product_id, quantity, unit_cost, total_cost,
                purchase_date, notes, recorded_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&purchase.id)
        .bind(&purchase.product_id)
        .bind(purchase.quantity)
        .bind(purchase.unit_cost)
        .bind(purchase.total_cost)
        .bind(purchase.purchase_date)
        .bind(&purchase.notes)
        .bind(&purchase.recorded_by)
        .bind(purchase.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Sums purchased base units for a (product, date) pair.
    ///
    /// This is the recompute source for `DailySnapshot.additions` — always
    /// derived fresh, never read from an accumulated counter.
    pub async fn sum_for_product_date(
        &self,
        product_id: &str,
        date: NaiveDate,
    ) -> DbResult<Quantity> {
        let total: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(quantity), 0)
            FROM purchase_events
            WHERE product_id = ?1 AND purchase_date = ?2
            "#,
        )
        .bind(product_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(Quantity::from_hundredths(total.unwrap_or(0)))
    }

    /// Updates a purchase's quantity and cost after an edit.
    pub async fn update_amounts(
        &self,
        id: &str,
        quantity: Quantity,
        unit_cost: Money,
        total_cost: Money,
    ) -> DbResult<()> {
        debug!(id = %id, quantity = %quantity, "Updating purchase");

        let result = sqlx::query(
            r#"
            UPDATE purchase_events
            SET quantity = ?2, unit_cost = ?3, total_cost = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(quantity)
        .bind(unit_cost)
        .bind(total_cost)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PurchaseEvent", id));
        }

        Ok(())
    }

    /// Deletes a purchase event (reversal).
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting purchase");

        let result = sqlx::query("DELETE FROM purchase_events WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PurchaseEvent", id));
        }

        Ok(())
    }

    /// Lists purchases for a date (reporting surface).
    pub async fn list_for_date(&self, date: NaiveDate) -> DbResult<Vec<PurchaseEvent>> {
        let purchases = sqlx::query_as::<_, PurchaseEvent>(
            r#"
            SELECT id, product_id, quantity, unit_cost, total_cost,
                   purchase_date, notes, recorded_by, created_at
            FROM purchase_events
            WHERE purchase_date = ?1
            ORDER BY created_at
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(purchases)
    }

    /// Lists all purchases across a date range (inclusive).
    pub async fn list_for_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<PurchaseEvent>> {
        let purchases = sqlx::query_as::<_, PurchaseEvent>(
            r#"
            SELECT id, product_id, quantity, unit_cost, total_cost,
                   purchase_date, notes, recorded_by, created_at
            FROM purchase_events
            WHERE purchase_date >= ?1 AND purchase_date <= ?2
            ORDER BY purchase_date, created_at
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(purchases)
    }

    /// Lists purchases for a product across a date range (inclusive).
    pub async fn list_for_product_range(
        &self,
        product_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<PurchaseEvent>> {
        let purchases = sqlx::query_as::<_, PurchaseEvent>(
            r#"
            SELECT id, product_id, quantity, unit_cost, total_cost,
                   purchase_date, notes, recorded_by, created_at
            FROM purchase_events
            WHERE product_id = ?1 AND purchase_date >= ?2 AND purchase_date <= ?3
            ORDER BY purchase_date, created_at
            "#,
        )
        .bind(product_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(purchases)
    }

    /// Counts purchases referencing a product (dependent-records guard).
    pub async fn count_for_product(&self, product_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM purchase_events WHERE product_id = ?1")
                .bind(product_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
