//! # Product Repository
//!
//! Database operations for products, including the ledger's atomic
//! stock mutations.
//!
//! ## Stock Compare-and-Swap
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                Why a Conditional UPDATE?                                │
//! │                                                                         │
//! │  ❌ WRONG: read-then-write (lost update under concurrency)             │
//! │     let stock = SELECT current_stock ...        ← both attendants      │
//! │     if stock >= needed { UPDATE ... }             see the same value   │
//! │                                                   and oversell         │
//! │                                                                         │
//! │  ✅ CORRECT: one guarded statement                                     │
//! │     UPDATE products                                                     │
//! │     SET current_stock = current_stock - ?                              │
//! │     WHERE id = ? AND current_stock >= ?                                │
//! │                                                                         │
//! │  The availability check and the decrement execute as one atomic       │
//! │  statement; zero rows affected means the check failed and nothing     │
//! │  changed.                                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use tally_core::{EntityStatus, Product, Quantity};

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let product = repo.get_by_id("uuid-here").await?;
/// let reduced = repo.reduce_stock("uuid-here", Quantity::from_units(3)).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, category, base_unit, buying_price,
                   current_stock, min_stock_level, status,
                   created_at, last_stock_update
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its unique name.
    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, category, base_unit, buying_price,
                   current_stock, min_stock_level, status,
                   created_at, last_stock_update
            FROM products
            WHERE name = ?1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products ordered by category then name.
    pub async fn list_active(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, category, base_unit, buying_price,
                   current_stock, min_stock_level, status,
                   created_at, last_stock_update
            FROM products
            WHERE status = 'active'
            ORDER BY category, name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(())` - Inserted
    /// * `Err(DbError::UniqueViolation)` - Name already exists
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(name = %product.name, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, category, base_unit, buying_price,
                current_stock, min_stock_level, status,
                created_at, last_stock_update
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.category)
        .bind(&product.base_unit)
        .bind(product.buying_price)
        .bind(product.current_stock)
        .bind(product.min_stock_level)
        .bind(product.status)
        .bind(product.created_at)
        .bind(product.last_stock_update)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Atomically reduces stock if enough is available.
    ///
    /// The availability check and the decrement are a single guarded
    /// UPDATE; two concurrent sales can never both pass the check against
    /// a stale value.
    ///
    /// ## Returns
    /// * `Ok(true)` - Stock reduced
    /// * `Ok(false)` - Insufficient stock; nothing changed
    /// * `Err(DbError::NotFound)` - Product doesn't exist
    pub async fn reduce_stock(&self, id: &str, base_units: Quantity) -> DbResult<bool> {
        debug!(id = %id, base_units = %base_units, "Reducing stock");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET current_stock = current_stock - ?2,
                last_stock_update = ?3
            WHERE id = ?1 AND current_stock >= ?2
            "#,
        )
        .bind(id)
        .bind(base_units)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Zero rows: either the guard failed or the product is missing.
        match self.get_by_id(id).await? {
            Some(_) => Ok(false),
            None => Err(DbError::not_found("Product", id)),
        }
    }

    /// Unconditionally adds stock.
    pub async fn add_stock(&self, id: &str, base_units: Quantity) -> DbResult<()> {
        debug!(id = %id, base_units = %base_units, "Adding stock");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET current_stock = current_stock + ?2,
                last_stock_update = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(base_units)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Sets stock to an absolute value.
    ///
    /// Used only by the snapshot engine to resync `current_stock` to a
    /// recomputed closing stock. Everything else goes through the delta
    /// operations above.
    pub async fn set_stock(&self, id: &str, stock: Quantity) -> DbResult<()> {
        debug!(id = %id, stock = %stock, "Resyncing stock");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE products
            SET current_stock = ?2,
                last_stock_update = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(stock)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Sets the lifecycle status.
    pub async fn set_status(&self, id: &str, status: EntityStatus) -> DbResult<()> {
        debug!(id = %id, ?status, "Setting product status");

        let result = sqlx::query("UPDATE products SET status = ?2 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts active products (for diagnostics and seeding).
    pub async fn count_active(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE status = 'active'")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
