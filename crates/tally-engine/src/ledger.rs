//! # Stock Ledger
//!
//! The single authoritative current-stock counter per product.
//!
//! ## Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Product.current_stock is owned HERE.                                   │
//! │                                                                         │
//! │  reduce_stock ──► guarded UPDATE (check + decrement, one statement)    │
//! │  add_stock ─────► unconditional delta UPDATE                           │
//! │  (resync) ──────► absolute set, snapshot engine only                   │
//! │                                                                         │
//! │  Two concurrent sales of the last unit: one guarded UPDATE wins,       │
//! │  the other affects zero rows and fails with InsufficientStock.         │
//! │  There is no window where both can read the same stale value.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use tally_core::{CoreError, Product, Quantity, StockStatus};
use tally_db::Database;

/// Atomic stock operations over the product table.
#[derive(Debug, Clone)]
pub struct StockLedger {
    db: Database,
}

impl StockLedger {
    pub fn new(db: Database) -> Self {
        StockLedger { db }
    }

    /// Reduces stock, failing with `InsufficientStock` if fewer than
    /// `base_units` are available. No partial effect on failure.
    ///
    /// The check-and-decrement is a single guarded UPDATE, so concurrent
    /// callers cannot both pass the availability check against a stale
    /// value and oversell the last unit.
    pub async fn reduce_stock(&self, product: &Product, base_units: Quantity) -> EngineResult<()> {
        debug!(product = %product.name, base_units = %base_units, "Ledger reduce");

        let reduced = self.db.products().reduce_stock(&product.id, base_units).await?;

        if !reduced {
            // Re-read for an accurate availability figure in the error;
            // the failed UPDATE changed nothing.
            let available = self.available(&product.id).await?;
            return Err(EngineError::Core(CoreError::InsufficientStock {
                product: product.name.clone(),
                available,
                requested: base_units,
            }));
        }

        Ok(())
    }

    /// Unconditionally increases stock.
    pub async fn add_stock(&self, product: &Product, base_units: Quantity) -> EngineResult<()> {
        debug!(product = %product.name, base_units = %base_units, "Ledger add");

        self.db.products().add_stock(&product.id, base_units).await?;
        Ok(())
    }

    /// Available stock: `max(0, current_stock)`.
    pub async fn available(&self, product_id: &str) -> EngineResult<Quantity> {
        let product = self
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Product", product_id))?;

        Ok(product.available_stock())
    }

    /// Derived stock level for a product. Informational only.
    pub async fn stock_status(&self, product_id: &str) -> EngineResult<StockStatus> {
        let product = self
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Product", product_id))?;

        let status = product.stock_status();
        if matches!(status, StockStatus::OutOfStock | StockStatus::LowStock) {
            info!(product = %product.name, ?status, stock = %product.available_stock(), "Stock running low");
        }

        Ok(status)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
