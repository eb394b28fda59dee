//! # Snapshot Repository
//!
//! Database operations for daily reconciliation rows.
//!
//! ## Row Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  (product, date) Row Lifecycle                          │
//! │                                                                         │
//! │  Absent ──insert()──► Materialized ──update_computed()──► (refreshed)  │
//! │                            │                                            │
//! │                            └─set_opening()─► (manually corrected)      │
//! │                                                                         │
//! │  Rows are never deleted; corrections overwrite opening_stock only.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::DailySnapshot;

/// Repository for daily snapshot database operations.
#[derive(Debug, Clone)]
pub struct SnapshotRepository {
    pool: SqlitePool,
}

impl SnapshotRepository {
    /// Creates a new SnapshotRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SnapshotRepository { pool }
    }

    /// Gets the snapshot for a (product, date) pair.
    pub async fn get_by_product_date(
        &self,
        product_id: &str,
        date: NaiveDate,
    ) -> DbResult<Option<DailySnapshot>> {
        let snapshot = sqlx::query_as::<_, DailySnapshot>(
            r#"
            SELECT id, product_id, date, opening_stock, additions,
                   sales_quantity, closing_stock, updated_by, updated_at
            FROM daily_snapshots
            WHERE product_id = ?1 AND date = ?2
            "#,
        )
        .bind(product_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(snapshot)
    }

    /// Checks whether any snapshot exists for the product strictly before
    /// the given date.
    ///
    /// Used to tell a first-ever day apart from a gap in history.
    pub async fn exists_before(&self, product_id: &str, date: NaiveDate) -> DbResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM daily_snapshots WHERE product_id = ?1 AND date < ?2",
        )
        .bind(product_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Gets the most recently dated snapshot for a product.
    pub async fn get_latest_for_product(&self, product_id: &str) -> DbResult<Option<DailySnapshot>> {
        let snapshot = sqlx::query_as::<_, DailySnapshot>(
            r#"
            SELECT id, product_id, date, opening_stock, additions,
                   sales_quantity, closing_stock, updated_by, updated_at
            FROM daily_snapshots
            WHERE product_id = ?1
            ORDER BY date DESC
            LIMIT 1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(snapshot)
    }

    /// Lists all snapshots for a date (reconciliation view).
    pub async fn list_for_date(&self, date: NaiveDate) -> DbResult<Vec<DailySnapshot>> {
        let snapshots = sqlx::query_as::<_, DailySnapshot>(
            r#"
            SELECT id, product_id, date, opening_stock, additions,
                   sales_quantity, closing_stock, updated_by, updated_at
            FROM daily_snapshots
            WHERE date = ?1
            ORDER BY product_id
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(snapshots)
    }

    /// Lists snapshots for a product across a date range (inclusive).
    ///
    /// Reporting surface: the external reporting collaborator re-aggregates
    /// these rows into period summaries.
    pub async fn list_for_product_range(
        &self,
        product_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> DbResult<Vec<DailySnapshot>> {
        let snapshots = sqlx::query_as::<_, DailySnapshot>(
            r#"
            SELECT id, product_id, date, opening_stock, additions,
                   sales_quantity, closing_stock, updated_by, updated_at
            FROM daily_snapshots
            WHERE product_id = ?1 AND date >= ?2 AND date <= ?3
            ORDER BY date
            "#,
        )
        .bind(product_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(snapshots)
    }

    /// Inserts a newly materialized snapshot.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - (product, date) already materialized
    pub async fn insert(&self, snapshot: &DailySnapshot) -> DbResult<()> {
        debug!(product_id = %snapshot.product_id, date = %snapshot.date, "Inserting snapshot");

        sqlx::query(
            r#"
            INSERT INTO daily_snapshots (
                id, product_id, date, opening_stock, additions,
                sales_quantity, closing_stock, updated_by, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&snapshot.id)
        .bind(&snapshot.product_id)
        .bind(snapshot.date)
        .bind(snapshot.opening_stock)
        .bind(snapshot.additions)
        .bind(snapshot.sales_quantity)
        .bind(snapshot.closing_stock)
        .bind(&snapshot.updated_by)
        .bind(snapshot.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Writes back a recomputed snapshot (all derived columns at once).
    pub async fn update_computed(&self, snapshot: &DailySnapshot) -> DbResult<()> {
        debug!(
            product_id = %snapshot.product_id,
            date = %snapshot.date,
            closing = %snapshot.closing_stock,
            "Updating snapshot"
        );

        let result = sqlx::query(
            r#"
            UPDATE daily_snapshots
            SET opening_stock = ?2,
                additions = ?3,
                sales_quantity = ?4,
                closing_stock = ?5,
                updated_by = ?6,
                updated_at = ?7
            WHERE id = ?1
            "#,
        )
        .bind(&snapshot.id)
        .bind(snapshot.opening_stock)
        .bind(snapshot.additions)
        .bind(snapshot.sales_quantity)
        .bind(snapshot.closing_stock)
        .bind(&snapshot.updated_by)
        .bind(snapshot.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("DailySnapshot", &snapshot.id));
        }

        Ok(())
    }
}
