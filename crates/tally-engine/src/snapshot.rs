//! # Daily Snapshot Engine
//!
//! Derives, caches, and self-heals one stock record per (product, date).
//!
//! ## Recompute-From-Source
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              The Central Robustness Property                            │
//! │                                                                         │
//! │  additions      = SUM(purchase_events WHERE product, date)             │
//! │  sales_quantity = SUM(sale_events.base_units WHERE product, date)      │
//! │  closing        = max(0, opening + additions − sales_quantity)         │
//! │  Product.current_stock ◄── closing   (resync)                          │
//! │                                                                         │
//! │  The stored additions/sales columns are CACHES. Every recompute        │
//! │  rebuilds them from the event tables; nothing ever increments them     │
//! │  in place, so they cannot silently drift from the facts.               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Materialization (state machine: Absent → Materialized)
//! ```text
//! get_or_create(product, date)
//!      │
//!      ├── row exists? ──────────────► recompute (it may be stale)
//!      │
//!      └── absent:
//!            opening = previous day's closing, if that row exists
//!                      else Product.current_stock (first day, or a gap)
//!            insert row, then recompute
//! ```
//!
//! The gap fallback is single-level by design: it does not walk further
//! back through multi-day gaps. Each fallback past existing history is
//! logged so an external backfill job can find it.

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::locks::ProductLocks;
use tally_core::{DailySnapshot, Quantity};
use tally_db::Database;

// =============================================================================
// Recompute Outcome
// =============================================================================

/// Result of a snapshot recomputation.
#[derive(Debug, Clone)]
pub struct RecomputeOutcome {
    pub snapshot: DailySnapshot,

    /// True when `opening + additions − sales` was negative before the
    /// defensive floor. The stored closing stock is already clamped to
    /// zero; the flag (and a warn log) surface the mismatch for operator
    /// review because recorded movement exceeded recorded stock.
    pub integrity_warning: bool,
}

// =============================================================================
// Snapshot Engine
// =============================================================================

/// Owner of all `DailySnapshot` rows.
#[derive(Clone)]
pub struct SnapshotEngine {
    db: Database,
    locks: Arc<ProductLocks>,
}

impl SnapshotEngine {
    pub fn new(db: Database, locks: Arc<ProductLocks>) -> Self {
        SnapshotEngine { db, locks }
    }

    /// Materializes (if absent) and recomputes the snapshot for a
    /// (product, date) pair.
    ///
    /// Safe to call at any time: the operation is idempotent, and
    /// concurrent calls for the same product are serialized.
    pub async fn get_or_create(
        &self,
        product_id: &str,
        date: NaiveDate,
    ) -> EngineResult<RecomputeOutcome> {
        let _guard = self.locks.acquire(product_id).await;

        self.materialize_locked(product_id, date).await?;
        self.recompute_locked(product_id, date, None, None).await
    }

    /// Ensures the (product, date) row exists. Caller holds the product lock.
    ///
    /// Opening stock comes from the previous day's closing when that row
    /// exists; otherwise the product's `current_stock` is the baseline
    /// (first-ever day, or a gap in history).
    pub(crate) async fn materialize_locked(
        &self,
        product_id: &str,
        date: NaiveDate,
    ) -> EngineResult<DailySnapshot> {
        if let Some(existing) = self.db.snapshots().get_by_product_date(product_id, date).await? {
            return Ok(existing);
        }

        let product = self
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Product", product_id))?;

        let previous = match date.pred_opt() {
            Some(prev_date) => {
                self.db
                    .snapshots()
                    .get_by_product_date(product_id, prev_date)
                    .await?
            }
            None => None,
        };

        let opening = match &previous {
            Some(prev) => prev.closing_stock,
            None => {
                if self.db.snapshots().exists_before(product_id, date).await? {
                    // Informational: the fallback is jumping over a gap of
                    // more than one day, so opening comes from the ledger
                    // rather than history.
                    info!(
                        product = %product.name,
                        %date,
                        baseline = %product.current_stock,
                        "Snapshot gap: no previous-day record, using current stock as opening"
                    );
                }
                product.current_stock
            }
        };

        debug!(product = %product.name, %date, opening = %opening, "Materializing snapshot");

        let snapshot = DailySnapshot {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            date,
            opening_stock: opening,
            additions: Quantity::zero(),
            sales_quantity: Quantity::zero(),
            closing_stock: opening,
            updated_by: None,
            updated_at: Utc::now(),
        };

        self.db.snapshots().insert(&snapshot).await?;
        Ok(snapshot)
    }

    /// Recomputes a materialized snapshot from the event tables and
    /// resyncs the product's current stock. Caller holds the product lock.
    ///
    /// `opening_override` is used only by the manual-correction path;
    /// everything else keeps the stored opening.
    pub(crate) async fn recompute_locked(
        &self,
        product_id: &str,
        date: NaiveDate,
        opening_override: Option<Quantity>,
        updated_by: Option<&str>,
    ) -> EngineResult<RecomputeOutcome> {
        let mut snapshot = self
            .db
            .snapshots()
            .get_by_product_date(product_id, date)
            .await?
            .ok_or_else(|| EngineError::not_found("DailySnapshot", format!("{product_id}@{date}")))?;

        if let Some(opening) = opening_override {
            snapshot.opening_stock = opening;
        }

        // Always derived fresh from the event tables, never incremented.
        snapshot.additions = self
            .db
            .purchases()
            .sum_for_product_date(product_id, date)
            .await?;
        snapshot.sales_quantity = self
            .db
            .sales()
            .sum_base_units_for_product_date(product_id, date)
            .await?;

        let (closing, clamped) = DailySnapshot::derive_closing(
            snapshot.opening_stock,
            snapshot.additions,
            snapshot.sales_quantity,
        );

        if clamped {
            warn!(
                product_id = %product_id,
                %date,
                opening = %snapshot.opening_stock,
                additions = %snapshot.additions,
                sales = %snapshot.sales_quantity,
                "Data integrity warning: recorded movement exceeds recorded stock, closing clamped to zero"
            );
        }

        snapshot.closing_stock = closing;
        snapshot.updated_by = updated_by.map(str::to_string);
        snapshot.updated_at = Utc::now();

        self.db.snapshots().update_computed(&snapshot).await?;

        // The snapshot is derived truth; the ledger counter follows it.
        self.db.products().set_stock(product_id, closing).await?;

        debug!(
            product_id = %product_id,
            %date,
            closing = %closing,
            "Snapshot recomputed"
        );

        Ok(RecomputeOutcome {
            snapshot,
            integrity_warning: clamped,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tally_core::{EntityStatus, Money, Product, ProductVariant, PurchaseEvent, SaleEvent};
    use tally_db::DbConfig;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    /// Inserts a product with a single full-bottle variant; sale rows in
    /// these tests reference that variant.
    async fn setup(stock_hundredths: i64) -> (Database, SnapshotEngine, String, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: "Jameson 750ml".to_string(),
            category: "Whiskey".to_string(),
            base_unit: "bottle".to_string(),
            buying_price: Money::from_cents(180000),
            current_stock: Quantity::from_hundredths(stock_hundredths),
            min_stock_level: Quantity::from_units(5),
            status: EntityStatus::Active,
            created_at: now,
            last_stock_update: now,
        };
        db.products().insert(&product).await.unwrap();

        let variant = ProductVariant {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            size_label: "Full Bottle".to_string(),
            selling_price: Money::from_cents(10000),
            conversion_factor: Quantity::from_units(1),
            sort_order: 0,
            status: EntityStatus::Active,
            created_at: now,
        };
        db.variants().insert(&variant).await.unwrap();

        let engine = SnapshotEngine::new(db.clone(), Arc::new(ProductLocks::new()));
        (db, engine, product.id, variant.id)
    }

    async fn insert_purchase(db: &Database, product_id: &str, qty: i64, day: NaiveDate) {
        let purchase = PurchaseEvent {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.to_string(),
            quantity: Quantity::from_hundredths(qty),
            unit_cost: Money::from_cents(5000),
            total_cost: Money::from_cents(5000).multiply_quantity(Quantity::from_hundredths(qty)),
            purchase_date: day,
            notes: None,
            recorded_by: "u1".to_string(),
            created_at: Utc::now(),
        };
        db.purchases().insert(&purchase).await.unwrap();
    }

    async fn insert_sale(
        db: &Database,
        product_id: &str,
        variant_id: &str,
        base_units: i64,
        day: NaiveDate,
    ) {
        let sale = SaleEvent {
            id: Uuid::new_v4().to_string(),
            variant_id: variant_id.to_string(),
            product_id: product_id.to_string(),
            quantity: Quantity::from_hundredths(base_units),
            conversion_factor: Quantity::from_units(1),
            base_units: Quantity::from_hundredths(base_units),
            unit_price: Money::from_cents(10000),
            original_amount: Money::from_cents(10000)
                .multiply_quantity(Quantity::from_hundredths(base_units)),
            discount_kind: tally_core::DiscountKind::None,
            discount_value: 0,
            discount_amount: Money::zero(),
            total_amount: Money::from_cents(10000)
                .multiply_quantity(Quantity::from_hundredths(base_units)),
            cash_amount: Money::from_cents(10000)
                .multiply_quantity(Quantity::from_hundredths(base_units)),
            mobile_amount: Money::zero(),
            credit_amount: Money::zero(),
            customer_name: None,
            discount_reason: None,
            notes: None,
            sale_date: day,
            recorded_by: "u1".to_string(),
            created_at: Utc::now(),
        };
        db.sales().insert(&sale).await.unwrap();
    }

    #[tokio::test]
    async fn test_first_day_baseline_is_current_stock() {
        let (_db, engine, product_id, _variant_id) = setup(1000).await;

        let outcome = engine.get_or_create(&product_id, date("2026-08-01")).await.unwrap();

        assert_eq!(outcome.snapshot.opening_stock, Quantity::from_units(10));
        assert_eq!(outcome.snapshot.additions, Quantity::zero());
        assert_eq!(outcome.snapshot.sales_quantity, Quantity::zero());
        assert_eq!(outcome.snapshot.closing_stock, Quantity::from_units(10));
        assert!(!outcome.integrity_warning);
    }

    #[tokio::test]
    async fn test_next_day_opening_is_previous_closing() {
        let (db, engine, product_id, _variant_id) = setup(1000).await;

        engine.get_or_create(&product_id, date("2026-08-01")).await.unwrap();
        insert_purchase(&db, &product_id, 200, date("2026-08-01")).await;
        let day1 = engine.get_or_create(&product_id, date("2026-08-01")).await.unwrap();
        assert_eq!(day1.snapshot.closing_stock, Quantity::from_units(12));

        let day2 = engine.get_or_create(&product_id, date("2026-08-02")).await.unwrap();
        assert_eq!(day2.snapshot.opening_stock, Quantity::from_units(12));
        assert_eq!(day2.snapshot.closing_stock, Quantity::from_units(12));
    }

    #[tokio::test]
    async fn test_gap_falls_back_to_current_stock() {
        let (_db, engine, product_id, _variant_id) = setup(1000).await;

        // History exists for the 1st; the 5th has no previous-day record.
        engine.get_or_create(&product_id, date("2026-08-01")).await.unwrap();
        let gapped = engine.get_or_create(&product_id, date("2026-08-05")).await.unwrap();

        // Single-level fallback: current_stock (resynced to 10 by day 1's
        // recompute) is the baseline, not a walk back through history.
        assert_eq!(gapped.snapshot.opening_stock, Quantity::from_units(10));
    }

    #[tokio::test]
    async fn test_recompute_sums_events() {
        let (db, engine, product_id, variant_id) = setup(1000).await;
        let day = date("2026-08-01");

        insert_purchase(&db, &product_id, 500, day).await;
        insert_purchase(&db, &product_id, 300, day).await;
        insert_sale(&db, &product_id, &variant_id, 340, day).await;

        let outcome = engine.get_or_create(&product_id, day).await.unwrap();

        assert_eq!(outcome.snapshot.additions, Quantity::from_hundredths(800));
        assert_eq!(outcome.snapshot.sales_quantity, Quantity::from_hundredths(340));
        // 10.00 + 8.00 − 3.40 = 14.60
        assert_eq!(outcome.snapshot.closing_stock, Quantity::from_hundredths(1460));

        // Product stock resynced to derived closing
        let product = db.products().get_by_id(&product_id).await.unwrap().unwrap();
        assert_eq!(product.current_stock, Quantity::from_hundredths(1460));
    }

    #[tokio::test]
    async fn test_recompute_is_idempotent() {
        let (db, engine, product_id, variant_id) = setup(1000).await;
        let day = date("2026-08-01");

        insert_purchase(&db, &product_id, 500, day).await;
        insert_sale(&db, &product_id, &variant_id, 300, day).await;

        let first = engine.get_or_create(&product_id, day).await.unwrap();
        let second = engine.get_or_create(&product_id, day).await.unwrap();
        let third = engine.get_or_create(&product_id, day).await.unwrap();

        assert_eq!(first.snapshot.opening_stock, third.snapshot.opening_stock);
        assert_eq!(first.snapshot.additions, second.snapshot.additions);
        assert_eq!(first.snapshot.sales_quantity, third.snapshot.sales_quantity);
        assert_eq!(first.snapshot.closing_stock, third.snapshot.closing_stock);
    }

    #[tokio::test]
    async fn test_overdrawn_day_clamps_and_warns() {
        let (db, engine, product_id, variant_id) = setup(100).await;
        let day = date("2026-08-01");

        // Events recorded out-of-band claim more sales than stock.
        insert_sale(&db, &product_id, &variant_id, 500, day).await;

        let outcome = engine.get_or_create(&product_id, day).await.unwrap();

        assert_eq!(outcome.snapshot.closing_stock, Quantity::zero());
        assert!(outcome.integrity_warning);

        // Self-healing: the ledger follows the clamped derived truth.
        let product = db.products().get_by_id(&product_id).await.unwrap().unwrap();
        assert_eq!(product.current_stock, Quantity::zero());
    }

    #[tokio::test]
    async fn test_purchase_round_trip_any_order() {
        let (db, engine, product_id, _variant_id) = setup(0).await;
        let day = date("2026-08-01");

        // Recompute before, between, and after inserts; additions always
        // equal the sum of the date's purchase rows.
        engine.get_or_create(&product_id, day).await.unwrap();
        insert_purchase(&db, &product_id, 250, day).await;
        let mid = engine.get_or_create(&product_id, day).await.unwrap();
        assert_eq!(mid.snapshot.additions, Quantity::from_hundredths(250));

        insert_purchase(&db, &product_id, 250, day).await;
        let done = engine.get_or_create(&product_id, day).await.unwrap();
        assert_eq!(done.snapshot.additions, Quantity::from_hundredths(500));
        assert_eq!(done.snapshot.closing_stock, Quantity::from_hundredths(500));
    }
}
