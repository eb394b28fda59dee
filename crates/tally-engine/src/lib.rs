//! # tally-engine: Stock Ledger & Daily Reconciliation Services
//!
//! The four components of the system, wired over the database layer.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Tally Stock Architecture                           │
//! │                                                                         │
//! │  External collaborators                                                │
//! │  (identity, audit store, reporting, rendering)                         │
//! │       │                      ▲                                          │
//! │       │ ActingUser           │ AuditEvent / query data                  │
//! │       ▼                      │                                          │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               ★ tally-engine (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │  catalog  │  │  ledger   │  │ snapshot  │  │ processor │  │   │
//! │  │   │ products, │  │ atomic    │  │ derive,   │  │ sale,     │  │   │
//! │  │   │ variants  │  │ stock ops │  │ self-heal │  │ purchase, │  │   │
//! │  │   │           │  │           │  │ per day   │  │ edits     │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   locks: per-product serialization   audit: event seam         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  tally-db (repositories) ──► SQLite                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig};
//! use tally_engine::Engine;
//!
//! let db = Database::new(DbConfig::new("./tally.db")).await?;
//! let engine = Engine::new(db);
//!
//! let product = engine.catalog().register_product(new_product, &user).await?;
//! let outcome = engine.processor().process_sale(request, &user).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod audit;
pub mod catalog;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod processor;
pub mod snapshot;

// =============================================================================
// Re-exports
// =============================================================================

pub use audit::{AuditAction, AuditEvent, AuditSink, RecordingAuditSink, TracingAuditSink};
pub use catalog::{Catalog, NewProduct, NewVariant};
pub use error::{EngineError, EngineResult};
pub use ledger::StockLedger;
pub use processor::{
    PurchaseEdit, PurchaseOutcome, PurchaseRequest, SaleEdit, SaleOutcome, SaleRequest,
    TransactionProcessor,
};
pub use snapshot::{RecomputeOutcome, SnapshotEngine};

use std::sync::Arc;

use locks::ProductLocks;
use tally_db::Database;

// =============================================================================
// Engine Facade
// =============================================================================

/// Entry point bundling the services over one database handle.
///
/// All services share the same per-product lock table, so a sale, a
/// purchase, and a snapshot recompute for one product can never
/// interleave their critical sections.
#[derive(Clone)]
pub struct Engine {
    db: Database,
    locks: Arc<ProductLocks>,
    audit: Arc<dyn AuditSink>,
}

impl Engine {
    /// Creates an engine with the default tracing audit sink.
    pub fn new(db: Database) -> Self {
        Engine::with_audit_sink(db, Arc::new(TracingAuditSink))
    }

    /// Creates an engine emitting audit events into the given sink.
    pub fn with_audit_sink(db: Database, audit: Arc<dyn AuditSink>) -> Self {
        Engine {
            db,
            locks: Arc::new(ProductLocks::new()),
            audit,
        }
    }

    /// Catalog operations: registration, variants, disabling.
    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.db.clone(), self.audit.clone())
    }

    /// The authoritative stock counter.
    pub fn ledger(&self) -> StockLedger {
        StockLedger::new(self.db.clone())
    }

    /// Daily snapshot derivation and self-healing.
    pub fn snapshots(&self) -> SnapshotEngine {
        SnapshotEngine::new(self.db.clone(), self.locks.clone())
    }

    /// Sale / purchase / edit / reversal / correction flows.
    pub fn processor(&self) -> TransactionProcessor {
        TransactionProcessor::new(self.db.clone(), self.locks.clone(), self.audit.clone())
    }

    /// The underlying database handle.
    ///
    /// The reporting collaborator reads events and snapshots through the
    /// repositories; no aggregates are computed in this crate.
    pub fn db(&self) -> &Database {
        &self.db
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::{ActingUser, Money, Quantity, Role};
    use tally_db::DbConfig;

    #[tokio::test]
    async fn test_engine_wires_services_together() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let engine = Engine::new(db);
        let admin = ActingUser::new("u1", "Asha", Role::Admin);

        let product = engine
            .catalog()
            .register_product(
                NewProduct {
                    name: "Tusker 500ml".to_string(),
                    category: "Beer".to_string(),
                    base_unit: "bottle".to_string(),
                    buying_price: Money::from_cents(15000),
                    opening_stock: Quantity::from_units(24),
                    min_stock_level: None,
                },
                &admin,
            )
            .await
            .unwrap();

        assert_eq!(
            engine.ledger().available(&product.id).await.unwrap(),
            Quantity::from_units(24)
        );
    }
}
