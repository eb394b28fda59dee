//! # Transaction Processor
//!
//! Entry point for Sale, Purchase, Edit, Reversal, and Manual-Correction
//! operations.
//!
//! ## Sale Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       process_sale                                      │
//! │                                                                         │
//! │  validate inputs (quantity, price, payment components)                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  discount ceiling by role ──► DiscountNotPermitted                     │
//! │  payment cover check ───────► InsufficientPayment                      │
//! │  credit needs customer ─────► MissingCustomer                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  acquire product lock                                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  materialize day's snapshot   ← BEFORE the stock moves, so a          │
//! │       │                         first-ever day opens at the           │
//! │       ▼                         pre-sale stock level                  │
//! │  guarded stock decrement ───► InsufficientStock (nothing changed)      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  insert SaleEvent ──► recompute snapshot ──► audit ──► SaleOutcome     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every failure path returns before the ledger moves; the snapshot row
//! materialized on the way in is a lazy read, not a mutation.
//!
//! ## Backdated events
//! A sale or purchase dated D recomputes D's snapshot and resyncs
//! `current_stock` to D's closing even when later days exist. Later days
//! heal the next time they are touched — their own recompute re-reads the
//! event tables.

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::error::{EngineError, EngineResult};
use crate::ledger::StockLedger;
use crate::locks::ProductLocks;
use crate::snapshot::{RecomputeOutcome, SnapshotEngine};
use tally_core::{
    validation, ActingUser, CoreError, DailySnapshot, Discount, DiscountKind, EntityStatus, Money,
    PaymentSplit, Product, ProductVariant, PurchaseEvent, Quantity, SaleEvent, ValidationError,
};
use tally_db::Database;

// =============================================================================
// Requests & Outcomes
// =============================================================================

/// Input for recording a sale.
#[derive(Debug, Clone)]
pub struct SaleRequest {
    pub variant_id: String,
    /// Variant units sold.
    pub quantity: Quantity,
    /// Price per variant unit.
    pub unit_price: Money,
    pub discount: Discount,
    /// Required whenever a discount is requested.
    pub discount_reason: Option<String>,
    pub payments: PaymentSplit,
    /// Required whenever the payment has a credit component.
    pub customer_name: Option<String>,
    pub notes: Option<String>,
    pub sale_date: NaiveDate,
}

/// Result of a processed sale.
#[derive(Debug, Clone)]
pub struct SaleOutcome {
    pub sale: SaleEvent,
    pub snapshot: DailySnapshot,
    /// Tendered minus total, floored at zero.
    pub change_due: Money,
    /// See [`RecomputeOutcome::integrity_warning`].
    pub integrity_warning: bool,
}

/// Input for recording a stock purchase.
#[derive(Debug, Clone)]
pub struct PurchaseRequest {
    pub product_id: String,
    /// Base units received.
    pub quantity: Quantity,
    /// Cost per base unit.
    pub unit_cost: Money,
    pub purchase_date: NaiveDate,
    pub notes: Option<String>,
}

/// Result of a processed purchase.
#[derive(Debug, Clone)]
pub struct PurchaseOutcome {
    pub purchase: PurchaseEvent,
    pub snapshot: DailySnapshot,
    pub integrity_warning: bool,
}

/// Fields a sale edit may change; `None` keeps the recorded value.
#[derive(Debug, Clone, Default)]
pub struct SaleEdit {
    pub quantity: Option<Quantity>,
    pub unit_price: Option<Money>,
    pub sale_date: Option<NaiveDate>,
    pub payments: Option<PaymentSplit>,
    pub customer_name: Option<String>,
    pub notes: Option<String>,
}

/// Fields a purchase edit may change.
#[derive(Debug, Clone, Default)]
pub struct PurchaseEdit {
    pub quantity: Option<Quantity>,
    pub unit_cost: Option<Money>,
}

// =============================================================================
// Transaction Processor
// =============================================================================

/// Validates, mutates the ledger, and triggers snapshot recomputation.
#[derive(Clone)]
pub struct TransactionProcessor {
    db: Database,
    locks: Arc<ProductLocks>,
    audit: Arc<dyn AuditSink>,
    ledger: StockLedger,
    snapshots: SnapshotEngine,
}

impl TransactionProcessor {
    pub fn new(db: Database, locks: Arc<ProductLocks>, audit: Arc<dyn AuditSink>) -> Self {
        TransactionProcessor {
            ledger: StockLedger::new(db.clone()),
            snapshots: SnapshotEngine::new(db.clone(), locks.clone()),
            db,
            locks,
            audit,
        }
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// Records a sale of one variant.
    pub async fn process_sale(
        &self,
        request: SaleRequest,
        user: &ActingUser,
    ) -> EngineResult<SaleOutcome> {
        validation::validate_positive_quantity(request.quantity)?;
        validation::validate_positive_price("unit_price", request.unit_price)?;
        validation::validate_payment_component("cash_amount", request.payments.cash)?;
        validation::validate_payment_component("mobile_amount", request.payments.mobile)?;
        validation::validate_payment_component("credit_amount", request.payments.credit)?;

        let variant = self.active_variant(&request.variant_id).await?;
        let product = self.active_product(&variant.product_id).await?;

        let original = request.unit_price.multiply_quantity(request.quantity);
        let discount_amount =
            check_discount(&request.discount, request.discount_reason.as_deref(), original, user)?;
        let total = original - discount_amount;

        let paid = request.payments.total();
        if paid < total {
            return Err(EngineError::Core(CoreError::InsufficientPayment {
                total,
                paid,
            }));
        }

        if request.payments.has_credit() && is_blank(request.customer_name.as_deref()) {
            return Err(EngineError::Core(CoreError::MissingCustomer));
        }

        let base_units = variant.base_units_for(request.quantity);
        if !base_units.is_positive() {
            // e.g. 0.04 of a 0.10 serving rounds to zero base units; the
            // sale would consume nothing and can only be a typo.
            return Err(EngineError::Core(CoreError::InvalidQuantity(format!(
                "{} x factor {} rounds to zero base units",
                request.quantity, variant.conversion_factor
            ))));
        }

        // Everything from here mutates shared per-product state.
        let _guard = self.locks.acquire(&product.id).await;

        // Materialize before the decrement: a first-ever day must open at
        // the pre-sale stock level.
        self.snapshots
            .materialize_locked(&product.id, request.sale_date)
            .await?;

        self.ledger.reduce_stock(&product, base_units).await?;

        let sale = SaleEvent {
            id: Uuid::new_v4().to_string(),
            variant_id: variant.id.clone(),
            product_id: product.id.clone(),
            quantity: request.quantity,
            conversion_factor: variant.conversion_factor,
            base_units,
            unit_price: request.unit_price,
            original_amount: original,
            discount_kind: request.discount.kind(),
            discount_value: request.discount.raw_value(),
            discount_amount,
            total_amount: total,
            cash_amount: request.payments.cash,
            mobile_amount: request.payments.mobile,
            credit_amount: request.payments.credit,
            customer_name: request.customer_name.clone(),
            discount_reason: request.discount_reason.clone(),
            notes: request.notes.clone(),
            sale_date: request.sale_date,
            recorded_by: user.id.clone(),
            created_at: Utc::now(),
        };
        self.db.sales().insert(&sale).await?;

        let recomputed = self
            .snapshots
            .recompute_locked(&product.id, request.sale_date, None, Some(user.id.as_str()))
            .await?;

        let change_due = paid.saturating_sub(total);

        info!(
            product = %product.name,
            size = %variant.size_label,
            quantity = %sale.quantity,
            total = %sale.total_amount,
            "Sale recorded"
        );

        let mut summary = format!(
            "Sale: {} - {} x{} @ {}",
            product.name, variant.size_label, sale.quantity, sale.unit_price
        );
        if sale.discount_amount.is_positive() {
            summary.push_str(&format!(
                " (discount -{}, final {})",
                sale.discount_amount, sale.total_amount
            ));
        } else {
            summary.push_str(&format!(" = {}", sale.total_amount));
        }
        if let Some(customer) = &sale.customer_name {
            summary.push_str(&format!(" (customer: {customer})"));
        }

        self.audit.record(
            AuditEvent::new(AuditAction::Create, "sale_event", &sale.id, user, summary)
                .with_new(&sale),
        );

        Ok(SaleOutcome {
            sale,
            snapshot: recomputed.snapshot,
            change_due,
            integrity_warning: recomputed.integrity_warning,
        })
    }

    /// Edits a recorded sale: quantity, price, date, payments.
    ///
    /// The stock delta is settled in base units against the frozen
    /// conversion factor; increasing consumption re-validates availability.
    pub async fn edit_sale(
        &self,
        sale_id: &str,
        edit: SaleEdit,
        user: &ActingUser,
    ) -> EngineResult<SaleOutcome> {
        let old = self
            .db
            .sales()
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| EngineError::not_found("SaleEvent", sale_id))?;

        check_event_ownership(&old.recorded_by, user)?;

        let product = self.active_product(&old.product_id).await?;

        let new_quantity = edit.quantity.unwrap_or(old.quantity);
        let new_price = edit.unit_price.unwrap_or(old.unit_price);
        let new_date = edit.sale_date.unwrap_or(old.sale_date);
        let new_payments = edit.payments.unwrap_or_else(|| old.payments());
        let new_customer = edit.customer_name.clone().or_else(|| old.customer_name.clone());

        validation::validate_positive_quantity(new_quantity)?;
        validation::validate_positive_price("unit_price", new_price)?;
        if new_payments.has_credit() && is_blank(new_customer.as_deref()) {
            return Err(EngineError::Core(CoreError::MissingCustomer));
        }

        let new_base_units = new_quantity.mul_factor(old.conversion_factor);
        if !new_base_units.is_positive() {
            return Err(EngineError::Core(CoreError::InvalidQuantity(format!(
                "{} x factor {} rounds to zero base units",
                new_quantity, old.conversion_factor
            ))));
        }

        let _guard = self.locks.acquire(&product.id).await;

        self.snapshots
            .materialize_locked(&product.id, old.sale_date)
            .await?;

        // Settle the stock delta before touching the event row; an
        // InsufficientStock failure leaves the sale exactly as recorded.
        let delta = new_base_units - old.base_units;
        if delta.is_positive() {
            self.ledger.reduce_stock(&product, delta).await?;
        } else if delta.is_negative() {
            self.ledger
                .add_stock(&product, Quantity::zero() - delta)
                .await?;
        }

        let original = new_price.multiply_quantity(new_quantity);
        let discount = discount_from_stored(old.discount_kind, old.discount_value);
        let discount_amount = discount.amount(original);

        let mut updated = old.clone();
        updated.quantity = new_quantity;
        updated.base_units = new_base_units;
        updated.unit_price = new_price;
        updated.original_amount = original;
        updated.discount_amount = discount_amount;
        updated.total_amount = original - discount_amount;
        updated.sale_date = new_date;
        updated.cash_amount = new_payments.cash;
        updated.mobile_amount = new_payments.mobile;
        updated.credit_amount = new_payments.credit;
        updated.customer_name = new_customer;
        if let Some(notes) = edit.notes {
            updated.notes = Some(notes);
        }

        self.db.sales().update(&updated).await?;

        // Old date first. When the date moved, the new date is
        // materialized only after the old day has healed, so a
        // consecutive-day opening picks up the corrected closing.
        let recomputed = if new_date != old.sale_date {
            self.snapshots
                .recompute_locked(&product.id, old.sale_date, None, Some(user.id.as_str()))
                .await?;
            self.snapshots.materialize_locked(&product.id, new_date).await?;
            self.snapshots
                .recompute_locked(&product.id, new_date, None, Some(user.id.as_str()))
                .await?
        } else {
            self.snapshots
                .recompute_locked(&product.id, old.sale_date, None, Some(user.id.as_str()))
                .await?
        };

        info!(sale_id = %sale_id, product = %product.name, "Sale edited");

        self.audit.record(
            AuditEvent::new(
                AuditAction::Update,
                "sale_event",
                sale_id,
                user,
                format!(
                    "Sale updated: {} x{} → x{}, total {} → {}",
                    product.name, old.quantity, updated.quantity, old.total_amount, updated.total_amount
                ),
            )
            .with_old(&old)
            .with_new(&updated),
        );

        let change_due = updated.payments().total().saturating_sub(updated.total_amount);

        Ok(SaleOutcome {
            sale: updated,
            snapshot: recomputed.snapshot,
            change_due,
            integrity_warning: recomputed.integrity_warning,
        })
    }

    /// Reverses (deletes) a sale, returning its base units to the ledger.
    pub async fn reverse_sale(
        &self,
        sale_id: &str,
        user: &ActingUser,
    ) -> EngineResult<RecomputeOutcome> {
        let sale = self
            .db
            .sales()
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| EngineError::not_found("SaleEvent", sale_id))?;

        check_event_ownership(&sale.recorded_by, user)?;

        let product = self.product(&sale.product_id).await?;

        let _guard = self.locks.acquire(&product.id).await;

        self.snapshots
            .materialize_locked(&product.id, sale.sale_date)
            .await?;

        self.ledger.add_stock(&product, sale.base_units).await?;
        self.db.sales().delete(sale_id).await?;

        let recomputed = self
            .snapshots
            .recompute_locked(&product.id, sale.sale_date, None, Some(user.id.as_str()))
            .await?;

        info!(sale_id = %sale_id, product = %product.name, "Sale reversed");

        self.audit.record(
            AuditEvent::new(
                AuditAction::Delete,
                "sale_event",
                sale_id,
                user,
                format!(
                    "Sale reversed: {} x{} = {}",
                    product.name, sale.quantity, sale.total_amount
                ),
            )
            .with_old(&sale),
        );

        Ok(recomputed)
    }

    // =========================================================================
    // Purchases
    // =========================================================================

    /// Records a stock delivery.
    pub async fn process_purchase(
        &self,
        request: PurchaseRequest,
        user: &ActingUser,
    ) -> EngineResult<PurchaseOutcome> {
        validation::validate_positive_quantity(request.quantity)?;
        validation::validate_positive_price("unit_cost", request.unit_cost)?;

        let product = self.active_product(&request.product_id).await?;

        let _guard = self.locks.acquire(&product.id).await;

        self.snapshots
            .materialize_locked(&product.id, request.purchase_date)
            .await?;

        let purchase = PurchaseEvent {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            quantity: request.quantity,
            unit_cost: request.unit_cost,
            total_cost: request.unit_cost.multiply_quantity(request.quantity),
            purchase_date: request.purchase_date,
            notes: request.notes.clone(),
            recorded_by: user.id.clone(),
            created_at: Utc::now(),
        };
        self.db.purchases().insert(&purchase).await?;

        self.ledger.add_stock(&product, request.quantity).await?;

        // additions are re-summed from the purchase table here, never
        // incremented on the snapshot row.
        let recomputed = self
            .snapshots
            .recompute_locked(&product.id, request.purchase_date, None, Some(user.id.as_str()))
            .await?;

        info!(
            product = %product.name,
            quantity = %purchase.quantity,
            cost = %purchase.total_cost,
            "Purchase recorded"
        );

        self.audit.record(
            AuditEvent::new(
                AuditAction::Create,
                "purchase_event",
                &purchase.id,
                user,
                format!(
                    "Purchase: {} +{} {}s @ {} = {}",
                    product.name,
                    purchase.quantity,
                    product.base_unit,
                    purchase.unit_cost,
                    purchase.total_cost
                ),
            )
            .with_new(&purchase),
        );

        Ok(PurchaseOutcome {
            purchase,
            snapshot: recomputed.snapshot,
            integrity_warning: recomputed.integrity_warning,
        })
    }

    /// Edits a recorded purchase's quantity or unit cost.
    ///
    /// Shrinking a delivery removes base units from the ledger and so
    /// re-validates availability — stock that was already sold cannot be
    /// un-received.
    pub async fn edit_purchase(
        &self,
        purchase_id: &str,
        edit: PurchaseEdit,
        user: &ActingUser,
    ) -> EngineResult<PurchaseOutcome> {
        let old = self
            .db
            .purchases()
            .get_by_id(purchase_id)
            .await?
            .ok_or_else(|| EngineError::not_found("PurchaseEvent", purchase_id))?;

        check_event_ownership(&old.recorded_by, user)?;

        let product = self.active_product(&old.product_id).await?;

        let new_quantity = edit.quantity.unwrap_or(old.quantity);
        let new_unit_cost = edit.unit_cost.unwrap_or(old.unit_cost);

        validation::validate_positive_quantity(new_quantity)?;
        validation::validate_positive_price("unit_cost", new_unit_cost)?;

        let _guard = self.locks.acquire(&product.id).await;

        self.snapshots
            .materialize_locked(&product.id, old.purchase_date)
            .await?;

        let delta = new_quantity - old.quantity;
        if delta.is_positive() {
            self.ledger.add_stock(&product, delta).await?;
        } else if delta.is_negative() {
            self.ledger
                .reduce_stock(&product, Quantity::zero() - delta)
                .await?;
        }

        let new_total = new_unit_cost.multiply_quantity(new_quantity);
        self.db
            .purchases()
            .update_amounts(purchase_id, new_quantity, new_unit_cost, new_total)
            .await?;

        let recomputed = self
            .snapshots
            .recompute_locked(&product.id, old.purchase_date, None, Some(user.id.as_str()))
            .await?;

        let mut updated = old.clone();
        updated.quantity = new_quantity;
        updated.unit_cost = new_unit_cost;
        updated.total_cost = new_total;

        info!(purchase_id = %purchase_id, product = %product.name, "Purchase edited");

        self.audit.record(
            AuditEvent::new(
                AuditAction::Update,
                "purchase_event",
                purchase_id,
                user,
                format!(
                    "Purchase updated: {} {} → {} {}s",
                    product.name, old.quantity, updated.quantity, product.base_unit
                ),
            )
            .with_old(&old)
            .with_new(&updated),
        );

        Ok(PurchaseOutcome {
            purchase: updated,
            snapshot: recomputed.snapshot,
            integrity_warning: recomputed.integrity_warning,
        })
    }

    /// Reverses (deletes) a purchase, removing its base units from the
    /// ledger.
    ///
    /// ## Errors
    /// * `InsufficientStock` - the delivered stock has already been sold
    pub async fn reverse_purchase(
        &self,
        purchase_id: &str,
        user: &ActingUser,
    ) -> EngineResult<RecomputeOutcome> {
        let purchase = self
            .db
            .purchases()
            .get_by_id(purchase_id)
            .await?
            .ok_or_else(|| EngineError::not_found("PurchaseEvent", purchase_id))?;

        check_event_ownership(&purchase.recorded_by, user)?;

        let product = self.product(&purchase.product_id).await?;

        let _guard = self.locks.acquire(&product.id).await;

        self.snapshots
            .materialize_locked(&product.id, purchase.purchase_date)
            .await?;

        self.ledger.reduce_stock(&product, purchase.quantity).await?;
        self.db.purchases().delete(purchase_id).await?;

        let recomputed = self
            .snapshots
            .recompute_locked(&product.id, purchase.purchase_date, None, Some(user.id.as_str()))
            .await?;

        info!(purchase_id = %purchase_id, product = %product.name, "Purchase reversed");

        self.audit.record(
            AuditEvent::new(
                AuditAction::Delete,
                "purchase_event",
                purchase_id,
                user,
                format!(
                    "Purchase reversed: {} -{} {}s",
                    product.name, purchase.quantity, product.base_unit
                ),
            )
            .with_old(&purchase),
        );

        Ok(recomputed)
    }

    // =========================================================================
    // Manual Correction
    // =========================================================================

    /// Overwrites a day's opening stock and recomputes from there.
    ///
    /// `additions` stays purchase-derived; this path never touches it.
    /// Always audited with the distinct `ManualCorrection` action, because
    /// a correction can mask upstream drift.
    pub async fn manual_correction(
        &self,
        product_id: &str,
        date: NaiveDate,
        new_opening: Quantity,
        user: &ActingUser,
    ) -> EngineResult<RecomputeOutcome> {
        validation::validate_non_negative_quantity("opening_stock", new_opening)?;

        let product = self.product(product_id).await?;

        let _guard = self.locks.acquire(&product.id).await;

        let before = self
            .snapshots
            .materialize_locked(&product.id, date)
            .await?;

        let recomputed = self
            .snapshots
            .recompute_locked(&product.id, date, Some(new_opening), Some(user.id.as_str()))
            .await?;

        info!(
            product = %product.name,
            %date,
            old_opening = %before.opening_stock,
            new_opening = %new_opening,
            "Manual stock correction"
        );

        self.audit.record(
            AuditEvent::new(
                AuditAction::ManualCorrection,
                "daily_snapshot",
                &recomputed.snapshot.id,
                user,
                format!(
                    "Manual correction: {} on {} opening {} → {}, closing {}",
                    product.name,
                    date,
                    before.opening_stock,
                    new_opening,
                    recomputed.snapshot.closing_stock
                ),
            )
            .with_old(&before)
            .with_new(&recomputed.snapshot),
        );

        Ok(recomputed)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    async fn product(&self, product_id: &str) -> EngineResult<Product> {
        self.db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Product", product_id))
    }

    async fn active_product(&self, product_id: &str) -> EngineResult<Product> {
        let product = self.product(product_id).await?;
        if product.status != EntityStatus::Active {
            return Err(EngineError::not_found("Product", product_id));
        }
        Ok(product)
    }

    async fn active_variant(&self, variant_id: &str) -> EngineResult<ProductVariant> {
        let variant = self
            .db
            .variants()
            .get_by_id(variant_id)
            .await?
            .ok_or_else(|| EngineError::not_found("ProductVariant", variant_id))?;

        if variant.status != EntityStatus::Active {
            return Err(EngineError::not_found("ProductVariant", variant_id));
        }

        Ok(variant)
    }
}

// =============================================================================
// Rule Helpers
// =============================================================================

/// Applies the role-based discount ceiling and the reason requirement.
///
/// Returns the computed discount amount on success.
fn check_discount(
    discount: &Discount,
    reason: Option<&str>,
    original: Money,
    user: &ActingUser,
) -> EngineResult<Money> {
    let amount = discount.amount(original);

    if !discount.is_none() && amount.is_positive() && is_blank(reason) {
        return Err(ValidationError::Required {
            field: "discount_reason".to_string(),
        }
        .into());
    }

    // The ceiling applies to the effective share of the original amount,
    // so a fixed discount cannot sidestep a percentage cap.
    let max_bps = user.role.max_discount_bps();
    let allowed = original.percentage_of(max_bps);

    if amount > allowed {
        let requested_bps = if original.is_positive() {
            ((amount.cents() as i128 * 10000 + original.cents() as i128 - 1)
                / original.cents() as i128) as u32
        } else {
            0
        };
        return Err(EngineError::Core(CoreError::DiscountNotPermitted {
            role: format!("{:?}", user.role).to_lowercase(),
            max_bps,
            requested_bps,
        }));
    }

    Ok(amount)
}

/// Attendants may only modify their own events.
fn check_event_ownership(recorded_by: &str, user: &ActingUser) -> EngineResult<()> {
    if recorded_by != user.id && !user.role.can_touch_others_events() {
        return Err(EngineError::Core(CoreError::NotEventOwner {
            user: user.id.to_string(),
            owner: recorded_by.to_string(),
        }));
    }
    Ok(())
}

/// Rebuilds the discount from its persisted kind and raw value.
fn discount_from_stored(kind: DiscountKind, value: i64) -> Discount {
    match kind {
        DiscountKind::None => Discount::None,
        DiscountKind::Percentage => Discount::Percentage(value as u32),
        DiscountKind::Fixed => Discount::Fixed(Money::from_cents(value)),
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::RecordingAuditSink;
    use tally_core::Role;
    use tally_db::DbConfig;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn attendant() -> ActingUser {
        ActingUser::new("u-att", "Brian", Role::Attendant)
    }

    fn manager() -> ActingUser {
        ActingUser::new("u-mgr", "Carol", Role::Manager)
    }

    fn cash(cents: i64) -> PaymentSplit {
        PaymentSplit::new(Money::from_cents(cents), Money::zero(), Money::zero())
    }

    fn sale_request(variant_id: &str, quantity: i64, price: i64, paid: i64, day: &str) -> SaleRequest {
        SaleRequest {
            variant_id: variant_id.to_string(),
            quantity: Quantity::from_hundredths(quantity),
            unit_price: Money::from_cents(price),
            discount: Discount::None,
            discount_reason: None,
            payments: cash(paid),
            customer_name: None,
            notes: None,
            sale_date: date(day),
        }
    }

    struct Fixture {
        db: Database,
        processor: TransactionProcessor,
        sink: Arc<RecordingAuditSink>,
        product: Product,
        bottle: ProductVariant,
        tot: ProductVariant,
    }

    /// Product with 10.00 bottles, min 5, a full-bottle variant (factor
    /// 1.00 @ 100.00) and a tot variant (factor 0.10 @ 15.00).
    async fn setup() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sink = Arc::new(RecordingAuditSink::new());
        let processor =
            TransactionProcessor::new(db.clone(), Arc::new(ProductLocks::new()), sink.clone());

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: "Jameson 750ml".to_string(),
            category: "Whiskey".to_string(),
            base_unit: "bottle".to_string(),
            buying_price: Money::from_cents(180000),
            current_stock: Quantity::from_units(10),
            min_stock_level: Quantity::from_units(5),
            status: EntityStatus::Active,
            created_at: now,
            last_stock_update: now,
        };
        db.products().insert(&product).await.unwrap();

        let bottle = ProductVariant {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            size_label: "Full Bottle".to_string(),
            selling_price: Money::from_cents(10000),
            conversion_factor: Quantity::from_units(1),
            sort_order: 0,
            status: EntityStatus::Active,
            created_at: now,
        };
        db.variants().insert(&bottle).await.unwrap();

        let tot = ProductVariant {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            size_label: "Tot".to_string(),
            selling_price: Money::from_cents(1500),
            conversion_factor: Quantity::from_hundredths(10),
            sort_order: 1,
            status: EntityStatus::Active,
            created_at: now,
        };
        db.variants().insert(&tot).await.unwrap();

        Fixture {
            db,
            processor,
            sink,
            product,
            bottle,
            tot,
        }
    }

    async fn current_stock(f: &Fixture) -> Quantity {
        f.db.products()
            .get_by_id(&f.product.id)
            .await
            .unwrap()
            .unwrap()
            .current_stock
    }

    /// Ledger and latest snapshot must agree after every operation.
    async fn assert_ledger_matches_snapshot(f: &Fixture) {
        let stock = current_stock(f).await;
        let latest = f
            .db
            .snapshots()
            .get_latest_for_product(&f.product.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stock, latest.closing_stock);
    }

    #[tokio::test]
    async fn test_sale_purchase_and_next_day_flow() {
        let f = setup().await;
        let day = "2026-08-06";

        // Sell 3 bottles at 100.00: stock 10 → 7, opening 10, sales 3.
        let outcome = f
            .processor
            .process_sale(sale_request(&f.bottle.id, 300, 10000, 30000, day), &attendant())
            .await
            .unwrap();
        assert_eq!(outcome.sale.total_amount, Money::from_cents(30000));
        assert_eq!(outcome.change_due, Money::zero());
        assert_eq!(outcome.snapshot.opening_stock, Quantity::from_units(10));
        assert_eq!(outcome.snapshot.sales_quantity, Quantity::from_units(3));
        assert_eq!(outcome.snapshot.closing_stock, Quantity::from_units(7));
        assert_eq!(current_stock(&f).await, Quantity::from_units(7));
        assert_ledger_matches_snapshot(&f).await;

        // Selling 20 fails and changes nothing.
        let err = f
            .processor
            .process_sale(
                sale_request(&f.bottle.id, 2000, 10000, 200000, day),
                &attendant(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InsufficientStock { .. })
        ));
        assert_eq!(current_stock(&f).await, Quantity::from_units(7));
        assert_ledger_matches_snapshot(&f).await;

        // Purchase 5 at 50.00: stock 12, additions 5, closing 12.
        let outcome = f
            .processor
            .process_purchase(
                PurchaseRequest {
                    product_id: f.product.id.clone(),
                    quantity: Quantity::from_units(5),
                    unit_cost: Money::from_cents(5000),
                    purchase_date: date(day),
                    notes: None,
                },
                &manager(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.purchase.total_cost, Money::from_cents(25000));
        assert_eq!(outcome.snapshot.additions, Quantity::from_units(5));
        assert_eq!(outcome.snapshot.closing_stock, Quantity::from_units(12));
        assert_eq!(current_stock(&f).await, Quantity::from_units(12));
        assert_ledger_matches_snapshot(&f).await;

        // Day D+1, no mutation yet: opening carries over from D's closing.
        let next = f
            .processor
            .snapshots
            .get_or_create(&f.product.id, date("2026-08-07"))
            .await
            .unwrap();
        assert_eq!(next.snapshot.opening_stock, Quantity::from_units(12));
        assert_eq!(next.snapshot.additions, Quantity::zero());
        assert_eq!(next.snapshot.sales_quantity, Quantity::zero());
        assert_eq!(next.snapshot.closing_stock, Quantity::from_units(12));
    }

    #[tokio::test]
    async fn test_fractional_tot_sale() {
        let f = setup().await;

        // 4 tots at factor 0.10 deduct 0.40 base units: 10.00 → 9.60.
        let outcome = f
            .processor
            .process_sale(sale_request(&f.tot.id, 400, 1500, 6000, "2026-08-06"), &attendant())
            .await
            .unwrap();
        assert_eq!(outcome.sale.base_units, Quantity::from_hundredths(40));
        assert_eq!(current_stock(&f).await, Quantity::from_hundredths(960));
        assert_eq!(
            outcome.snapshot.sales_quantity,
            Quantity::from_hundredths(40)
        );
        assert_ledger_matches_snapshot(&f).await;
    }

    #[tokio::test]
    async fn test_discount_ceiling_by_role() {
        let f = setup().await;
        let day = "2026-08-06";

        // Attendant at exactly 10% passes.
        let mut request = sale_request(&f.bottle.id, 100, 10000, 9000, day);
        request.discount = Discount::Percentage(1000);
        request.discount_reason = Some("regular".to_string());
        f.processor.process_sale(request, &attendant()).await.unwrap();

        // Attendant at 15% is rejected, stock untouched.
        let before = current_stock(&f).await;
        let mut request = sale_request(&f.bottle.id, 100, 10000, 10000, day);
        request.discount = Discount::Percentage(1500);
        request.discount_reason = Some("friend".to_string());
        let err = f.processor.process_sale(request, &attendant()).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::DiscountNotPermitted { .. })
        ));
        assert_eq!(current_stock(&f).await, before);

        // Manager at 15% passes.
        let mut request = sale_request(&f.bottle.id, 100, 10000, 8500, day);
        request.discount = Discount::Percentage(1500);
        request.discount_reason = Some("promo".to_string());
        f.processor.process_sale(request, &manager()).await.unwrap();

        // A fixed discount over the attendant's 10% share is also rejected.
        let mut request = sale_request(&f.bottle.id, 100, 10000, 10000, day);
        request.discount = Discount::Fixed(Money::from_cents(2000));
        request.discount_reason = Some("friend".to_string());
        let err = f.processor.process_sale(request, &attendant()).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::DiscountNotPermitted { .. })
        ));
    }

    #[tokio::test]
    async fn test_discount_requires_reason() {
        let f = setup().await;

        let mut request = sale_request(&f.bottle.id, 100, 10000, 9000, "2026-08-06");
        request.discount = Discount::Percentage(1000);
        let err = f.processor.process_sale(request, &attendant()).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::Validation(ValidationError::Required { .. }))
        ));
    }

    #[tokio::test]
    async fn test_payment_rules() {
        let f = setup().await;
        let day = "2026-08-06";

        // Shortfall rejected, stock untouched.
        let err = f
            .processor
            .process_sale(sale_request(&f.bottle.id, 300, 10000, 20000, day), &attendant())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InsufficientPayment { .. })
        ));
        assert_eq!(current_stock(&f).await, Quantity::from_units(10));

        // Credit without a customer rejected.
        let mut request = sale_request(&f.bottle.id, 100, 10000, 0, day);
        request.payments = PaymentSplit::new(Money::zero(), Money::zero(), Money::from_cents(10000));
        let err = f.processor.process_sale(request, &attendant()).await.unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::MissingCustomer)));

        // Credit with a customer passes; overpayment produces change.
        let mut request = sale_request(&f.bottle.id, 100, 10000, 0, day);
        request.payments =
            PaymentSplit::new(Money::from_cents(5000), Money::zero(), Money::from_cents(6000));
        request.customer_name = Some("Wanjiku".to_string());
        let outcome = f.processor.process_sale(request, &attendant()).await.unwrap();
        assert_eq!(outcome.change_due, Money::from_cents(1000));
    }

    #[tokio::test]
    async fn test_invalid_inputs_rejected() {
        let f = setup().await;

        let err = f
            .processor
            .process_sale(sale_request(&f.bottle.id, 0, 10000, 0, "2026-08-06"), &attendant())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::Validation(_))));

        let err = f
            .processor
            .process_purchase(
                PurchaseRequest {
                    product_id: f.product.id.clone(),
                    quantity: Quantity::zero(),
                    unit_cost: Money::from_cents(5000),
                    purchase_date: date("2026-08-06"),
                    notes: None,
                },
                &manager(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::Validation(_))));

        // 0.04 tots of a 0.10 serving rounds to zero base units.
        let err = f
            .processor
            .process_sale(sale_request(&f.tot.id, 4, 1500, 1500, "2026-08-06"), &attendant())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::InvalidQuantity(_))));
    }

    #[tokio::test]
    async fn test_edit_sale_quantity_and_availability() {
        let f = setup().await;
        let day = "2026-08-06";

        let sold = f
            .processor
            .process_sale(sale_request(&f.bottle.id, 300, 10000, 30000, day), &attendant())
            .await
            .unwrap();
        assert_eq!(current_stock(&f).await, Quantity::from_units(7));

        // 3 → 5 takes two more bottles and recomputes amounts.
        let edited = f
            .processor
            .edit_sale(
                &sold.sale.id,
                SaleEdit {
                    quantity: Some(Quantity::from_units(5)),
                    payments: Some(cash(50000)),
                    ..Default::default()
                },
                &attendant(),
            )
            .await
            .unwrap();
        assert_eq!(edited.sale.total_amount, Money::from_cents(50000));
        assert_eq!(current_stock(&f).await, Quantity::from_units(5));
        assert_eq!(edited.snapshot.sales_quantity, Quantity::from_units(5));
        assert_ledger_matches_snapshot(&f).await;

        // 5 → 1 returns four bottles.
        f.processor
            .edit_sale(
                &sold.sale.id,
                SaleEdit {
                    quantity: Some(Quantity::from_units(1)),
                    ..Default::default()
                },
                &attendant(),
            )
            .await
            .unwrap();
        assert_eq!(current_stock(&f).await, Quantity::from_units(9));

        // Raising past availability fails and leaves the sale unchanged.
        let err = f
            .processor
            .edit_sale(
                &sold.sale.id,
                SaleEdit {
                    quantity: Some(Quantity::from_units(30)),
                    ..Default::default()
                },
                &attendant(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InsufficientStock { .. })
        ));
        let stored = f.db.sales().get_by_id(&sold.sale.id).await.unwrap().unwrap();
        assert_eq!(stored.quantity, Quantity::from_units(1));
        assert_eq!(current_stock(&f).await, Quantity::from_units(9));
    }

    #[tokio::test]
    async fn test_edit_sale_date_change_recomputes_both_days() {
        let f = setup().await;

        let sold = f
            .processor
            .process_sale(
                sale_request(&f.bottle.id, 200, 10000, 20000, "2026-08-06"),
                &attendant(),
            )
            .await
            .unwrap();

        f.processor
            .edit_sale(
                &sold.sale.id,
                SaleEdit {
                    sale_date: Some(date("2026-08-07")),
                    ..Default::default()
                },
                &attendant(),
            )
            .await
            .unwrap();

        let old_day = f
            .db
            .snapshots()
            .get_by_product_date(&f.product.id, date("2026-08-06"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(old_day.sales_quantity, Quantity::zero());
        assert_eq!(old_day.closing_stock, Quantity::from_units(10));

        let new_day = f
            .db
            .snapshots()
            .get_by_product_date(&f.product.id, date("2026-08-07"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(new_day.sales_quantity, Quantity::from_units(2));
        assert_eq!(new_day.closing_stock, Quantity::from_units(8));
    }

    #[tokio::test]
    async fn test_event_ownership() {
        let f = setup().await;

        let sold = f
            .processor
            .process_sale(
                sale_request(&f.bottle.id, 100, 10000, 10000, "2026-08-06"),
                &attendant(),
            )
            .await
            .unwrap();

        // Another attendant may not touch it.
        let other = ActingUser::new("u-other", "Dan", Role::Attendant);
        let err = f
            .processor
            .reverse_sale(&sold.sale.id, &other)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::NotEventOwner { .. })));

        // A manager may.
        f.processor.reverse_sale(&sold.sale.id, &manager()).await.unwrap();
    }

    #[tokio::test]
    async fn test_reverse_sale_returns_stock() {
        let f = setup().await;

        let sold = f
            .processor
            .process_sale(
                sale_request(&f.bottle.id, 300, 10000, 30000, "2026-08-06"),
                &attendant(),
            )
            .await
            .unwrap();
        assert_eq!(current_stock(&f).await, Quantity::from_units(7));

        let outcome = f
            .processor
            .reverse_sale(&sold.sale.id, &attendant())
            .await
            .unwrap();
        assert_eq!(outcome.snapshot.sales_quantity, Quantity::zero());
        assert_eq!(outcome.snapshot.closing_stock, Quantity::from_units(10));
        assert_eq!(current_stock(&f).await, Quantity::from_units(10));
        assert_ledger_matches_snapshot(&f).await;
    }

    #[tokio::test]
    async fn test_purchase_edit_and_reversal() {
        let f = setup().await;
        let day = "2026-08-06";

        let bought = f
            .processor
            .process_purchase(
                PurchaseRequest {
                    product_id: f.product.id.clone(),
                    quantity: Quantity::from_units(5),
                    unit_cost: Money::from_cents(5000),
                    purchase_date: date(day),
                    notes: None,
                },
                &manager(),
            )
            .await
            .unwrap();
        assert_eq!(current_stock(&f).await, Quantity::from_units(15));

        // 5 → 2 un-receives three bottles.
        let edited = f
            .processor
            .edit_purchase(
                &bought.purchase.id,
                PurchaseEdit {
                    quantity: Some(Quantity::from_units(2)),
                    ..Default::default()
                },
                &manager(),
            )
            .await
            .unwrap();
        assert_eq!(edited.purchase.total_cost, Money::from_cents(10000));
        assert_eq!(edited.snapshot.additions, Quantity::from_units(2));
        assert_eq!(current_stock(&f).await, Quantity::from_units(12));

        // Full reversal.
        let outcome = f
            .processor
            .reverse_purchase(&bought.purchase.id, &manager())
            .await
            .unwrap();
        assert_eq!(outcome.snapshot.additions, Quantity::zero());
        assert_eq!(current_stock(&f).await, Quantity::from_units(10));
        assert_ledger_matches_snapshot(&f).await;
    }

    #[tokio::test]
    async fn test_reverse_purchase_blocked_when_stock_sold() {
        let f = setup().await;
        let day = "2026-08-06";

        let bought = f
            .processor
            .process_purchase(
                PurchaseRequest {
                    product_id: f.product.id.clone(),
                    quantity: Quantity::from_units(5),
                    unit_cost: Money::from_cents(5000),
                    purchase_date: date(day),
                    notes: None,
                },
                &manager(),
            )
            .await
            .unwrap();

        // Sell 12 of the 15: only 3 left, the 5-bottle delivery cannot be
        // un-received.
        f.processor
            .process_sale(sale_request(&f.bottle.id, 1200, 10000, 120000, day), &attendant())
            .await
            .unwrap();

        let err = f
            .processor
            .reverse_purchase(&bought.purchase.id, &manager())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InsufficientStock { .. })
        ));
    }

    #[tokio::test]
    async fn test_manual_correction_touches_opening_only() {
        let f = setup().await;
        let day = "2026-08-06";

        // A day with a purchase and a sale on record.
        f.processor
            .process_purchase(
                PurchaseRequest {
                    product_id: f.product.id.clone(),
                    quantity: Quantity::from_units(5),
                    unit_cost: Money::from_cents(5000),
                    purchase_date: date(day),
                    notes: None,
                },
                &manager(),
            )
            .await
            .unwrap();
        f.processor
            .process_sale(sale_request(&f.bottle.id, 300, 10000, 30000, day), &attendant())
            .await
            .unwrap();

        // Correct the opening from 10 to 8.
        let outcome = f
            .processor
            .manual_correction(&f.product.id, date(day), Quantity::from_units(8), &manager())
            .await
            .unwrap();

        assert_eq!(outcome.snapshot.opening_stock, Quantity::from_units(8));
        // additions stayed purchase-derived, sales stayed event-derived.
        assert_eq!(outcome.snapshot.additions, Quantity::from_units(5));
        assert_eq!(outcome.snapshot.sales_quantity, Quantity::from_units(3));
        assert_eq!(outcome.snapshot.closing_stock, Quantity::from_units(10));
        assert_eq!(current_stock(&f).await, Quantity::from_units(10));

        // Audited with the distinct action kind.
        let actions: Vec<AuditAction> = f.sink.events().iter().map(|e| e.action).collect();
        assert!(actions.contains(&AuditAction::ManualCorrection));
    }

    #[tokio::test]
    async fn test_audit_event_per_mutation() {
        let f = setup().await;
        let day = "2026-08-06";

        f.processor
            .process_sale(sale_request(&f.bottle.id, 100, 10000, 10000, day), &attendant())
            .await
            .unwrap();
        f.processor
            .process_purchase(
                PurchaseRequest {
                    product_id: f.product.id.clone(),
                    quantity: Quantity::from_units(2),
                    unit_cost: Money::from_cents(5000),
                    purchase_date: date(day),
                    notes: None,
                },
                &manager(),
            )
            .await
            .unwrap();

        let events = f.sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].entity, "sale_event");
        assert_eq!(events[1].entity, "purchase_event");
        assert!(events.iter().all(|e| !e.summary.is_empty()));
    }
}
