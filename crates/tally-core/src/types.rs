//! # Domain Types
//!
//! Core domain types used throughout Tally Stock.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │ ProductVariant  │   │  DailySnapshot  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  name (unique)  │   │  size_label     │   │  product + date │       │
//! │  │  current_stock  │   │  conversion     │   │  open/add/sale/ │       │
//! │  │  (base units)   │   │  factor         │   │  close          │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  PurchaseEvent  │   │    SaleEvent    │   │   ActingUser    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  base units in  │   │  variant units  │   │  id + role      │       │
//! │  │  unit cost      │   │  out, payments  │   │  (no ambient    │       │
//! │  └─────────────────┘   └─────────────────┘   │   state)        │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business key: (name), (product, size_label), (product, date)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::quantity::Quantity;

// =============================================================================
// Entity Status
// =============================================================================

/// Lifecycle status shared by catalog entities.
///
/// A single tagged enum instead of per-entity `is_active` booleans: the
/// same referential-integrity guard applies to every entity kind, so the
/// status vocabulary must be shared too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    /// Entity is in use and visible.
    Active,
    /// Entity is retired; kept for historical references.
    Disabled,
}

impl Default for EntityStatus {
    fn default() -> Self {
        EntityStatus::Active
    }
}

// =============================================================================
// Stock Status
// =============================================================================

/// Derived stock level classification. Informational only, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    /// No stock available (≤ 0 base units).
    OutOfStock,
    /// At or below the minimum stock level.
    LowStock,
    /// At or below twice the minimum stock level.
    MediumStock,
    /// Comfortably above the minimum.
    GoodStock,
}

// =============================================================================
// Acting User
// =============================================================================

/// Role of the user performing an operation.
///
/// Supplied by the identity collaborator; the only rule attached to it
/// here is the discount ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Attendant,
    Manager,
    Admin,
}

impl Role {
    /// Maximum discount this role may grant, in basis points.
    ///
    /// attendant ≤ 10%, manager ≤ 25%, admin ≤ 100%
    #[inline]
    pub const fn max_discount_bps(&self) -> u32 {
        match self {
            Role::Attendant => 1000,
            Role::Manager => 2500,
            Role::Admin => 10000,
        }
    }

    /// Whether this role may edit or reverse events recorded by others.
    #[inline]
    pub const fn can_touch_others_events(&self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }
}

/// The user performing an operation, passed explicitly into every
/// mutating call.
///
/// There is deliberately no ambient "current user": attribution travels
/// with the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActingUser {
    /// User id from the identity collaborator.
    pub id: String,
    /// Display name, used in audit summaries.
    pub name: String,
    pub role: Role,
}

impl ActingUser {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role) -> Self {
        ActingUser {
            id: id.into(),
            name: name.into(),
            role,
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A stocked product, counted in base units (e.g. bottles).
///
/// `current_stock` is owned by the Stock Ledger and always equals the
/// closing stock of the most recently materialized daily snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name. Unique across all products.
    pub name: String,

    /// Category label (catalog administration is external).
    pub category: String,

    /// What one unit of stock physically is, e.g. "bottle".
    pub base_unit: String,

    /// Cost per base unit.
    pub buying_price: Money,

    /// Authoritative stock level in base units. Never below zero.
    pub current_stock: Quantity,

    /// Reorder threshold in base units.
    pub min_stock_level: Quantity,

    pub status: EntityStatus,

    pub created_at: DateTime<Utc>,

    /// When the ledger last touched `current_stock`.
    pub last_stock_update: DateTime<Utc>,
}

impl Product {
    /// Available stock, floored at zero.
    #[inline]
    pub fn available_stock(&self) -> Quantity {
        self.current_stock.floor_zero()
    }

    /// Checks whether the requested base units can be covered.
    pub fn can_cover(&self, base_units: Quantity) -> bool {
        self.available_stock() >= base_units
    }

    /// Derived stock level classification.
    ///
    /// ## Thresholds
    /// ```text
    /// available ≤ 0              → OutOfStock
    /// available ≤ min            → LowStock
    /// available ≤ 2 × min        → MediumStock
    /// otherwise                  → GoodStock
    /// ```
    pub fn stock_status(&self) -> StockStatus {
        let available = self.available_stock();
        let double_min = Quantity::from_hundredths(self.min_stock_level.hundredths() * 2);

        if available.is_zero() {
            StockStatus::OutOfStock
        } else if available <= self.min_stock_level {
            StockStatus::LowStock
        } else if available <= double_min {
            StockStatus::MediumStock
        } else {
            StockStatus::GoodStock
        }
    }
}

// =============================================================================
// Product Variant
// =============================================================================

/// A sellable serving of a product (e.g. full bottle, tot).
///
/// One variant unit consumes `conversion_factor` base units; the factor
/// may be below one for fractional servings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductVariant {
    pub id: String,

    pub product_id: String,

    /// Serving size label, unique per product (e.g. "Tot", "Full Bottle").
    pub size_label: String,

    /// Price per variant unit.
    pub selling_price: Money,

    /// Base units consumed per variant unit. Always > 0.
    pub conversion_factor: Quantity,

    /// Position in variant listings.
    pub sort_order: i64,

    pub status: EntityStatus,

    pub created_at: DateTime<Utc>,
}

impl ProductVariant {
    /// Base units consumed by selling `quantity` variant units.
    #[inline]
    pub fn base_units_for(&self, quantity: Quantity) -> Quantity {
        quantity.mul_factor(self.conversion_factor)
    }

    /// How many whole variant units the given base stock can serve.
    pub fn servable_units(&self, base_stock: Quantity) -> i64 {
        if !self.conversion_factor.is_positive() {
            return 0;
        }
        base_stock.floor_zero().hundredths() / self.conversion_factor.hundredths()
    }

    /// Profit earned per variant unit at the given base-unit cost.
    pub fn profit_per_unit(&self, buying_price: Money) -> Money {
        self.selling_price - buying_price.multiply_quantity(self.conversion_factor)
    }
}

// =============================================================================
// Daily Snapshot
// =============================================================================

/// The per-day reconciliation record for one product.
///
/// Keyed uniquely by (product, date). `additions` and `sales_quantity`
/// are caches rebuilt from the event tables on every recompute; only
/// `opening_stock` carries state forward between days.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DailySnapshot {
    pub id: String,

    pub product_id: String,

    /// Calendar date this record reconciles.
    pub date: NaiveDate,

    /// Stock at start of day, in base units.
    pub opening_stock: Quantity,

    /// Purchases received during the day, in base units.
    pub additions: Quantity,

    /// Sales during the day, converted to base units.
    pub sales_quantity: Quantity,

    /// `max(0, opening + additions − sales)`.
    pub closing_stock: Quantity,

    /// User id of the last writer (recompute or manual correction).
    pub updated_by: Option<String>,

    pub updated_at: DateTime<Utc>,
}

impl DailySnapshot {
    /// Derives closing stock from the other three columns.
    ///
    /// Returns the floored closing value plus a flag marking whether the
    /// pre-floor result was negative. A negative pre-floor value means
    /// recorded movement exceeds recorded stock and deserves operator
    /// review, even though the stored value is clamped.
    pub fn derive_closing(
        opening: Quantity,
        additions: Quantity,
        sales: Quantity,
    ) -> (Quantity, bool) {
        let raw = opening + additions - sales;
        (raw.floor_zero(), raw.is_negative())
    }
}

// =============================================================================
// Purchase Event
// =============================================================================

/// A stock delivery. Increases the ledger and the day's `additions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseEvent {
    pub id: String,

    pub product_id: String,

    /// Base units received. Fractional amounts are legal.
    pub quantity: Quantity,

    /// Cost per base unit.
    pub unit_cost: Money,

    /// `quantity × unit_cost`, frozen at record time.
    pub total_cost: Money,

    pub purchase_date: NaiveDate,

    pub notes: Option<String>,

    /// User id of the recorder.
    pub recorded_by: String,

    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Discount
// =============================================================================

/// Persisted discriminant of a discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    None,
    Percentage,
    Fixed,
}

/// A discount requested on a sale.
///
/// ## Semantics
/// ```text
/// Percentage(bps) → amount = original × bps / 10000
/// Fixed(m)        → amount = min(m, original)
/// None            → amount = 0
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Discount {
    None,
    /// Percentage in basis points (1000 = 10%).
    Percentage(u32),
    /// Flat amount off, capped at the original amount.
    Fixed(Money),
}

impl Discount {
    /// The discount amount against an original line total.
    pub fn amount(&self, original: Money) -> Money {
        match self {
            Discount::None => Money::zero(),
            Discount::Percentage(bps) => original.percentage_of(*bps),
            Discount::Fixed(value) => (*value).min(original),
        }
    }

    /// Persisted discriminant.
    pub fn kind(&self) -> DiscountKind {
        match self {
            Discount::None => DiscountKind::None,
            Discount::Percentage(_) => DiscountKind::Percentage,
            Discount::Fixed(_) => DiscountKind::Fixed,
        }
    }

    /// Raw stored value: basis points for a percentage, cents for a
    /// fixed amount, zero for none.
    pub fn raw_value(&self) -> i64 {
        match self {
            Discount::None => 0,
            Discount::Percentage(bps) => *bps as i64,
            Discount::Fixed(value) => value.cents(),
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Discount::None)
    }
}

// =============================================================================
// Payment Split
// =============================================================================

/// How a sale was paid, split across tender types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PaymentSplit {
    pub cash: Money,
    pub mobile: Money,
    pub credit: Money,
}

impl PaymentSplit {
    pub fn new(cash: Money, mobile: Money, credit: Money) -> Self {
        PaymentSplit { cash, mobile, credit }
    }

    /// Total tendered across all methods.
    #[inline]
    pub fn total(&self) -> Money {
        self.cash + self.mobile + self.credit
    }

    /// Whether any part of the payment is on credit.
    #[inline]
    pub fn has_credit(&self) -> bool {
        self.credit.is_positive()
    }
}

// =============================================================================
// Sale Event
// =============================================================================

/// A sale of one variant. Decreases the ledger by
/// `quantity × conversion_factor` base units.
///
/// Uses the snapshot pattern: the conversion factor and derived base
/// units are frozen at sale time, so a later variant edit never rewrites
/// recorded history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleEvent {
    pub id: String,

    pub variant_id: String,

    /// Denormalized from the variant so per-product recomputation never
    /// needs a join against mutable catalog rows.
    pub product_id: String,

    /// Variant units sold. Fractional amounts are legal.
    pub quantity: Quantity,

    /// Conversion factor at time of sale (frozen).
    pub conversion_factor: Quantity,

    /// `quantity × conversion_factor` at time of sale (frozen).
    pub base_units: Quantity,

    /// Price per variant unit at time of sale.
    pub unit_price: Money,

    /// `quantity × unit_price` before discount.
    pub original_amount: Money,

    pub discount_kind: DiscountKind,

    /// Basis points for a percentage discount, cents for a fixed one.
    pub discount_value: i64,

    /// Computed discount amount.
    pub discount_amount: Money,

    /// `original_amount − discount_amount`.
    pub total_amount: Money,

    pub cash_amount: Money,
    pub mobile_amount: Money,
    pub credit_amount: Money,

    /// Required whenever `credit_amount` is positive.
    pub customer_name: Option<String>,

    pub discount_reason: Option<String>,

    pub notes: Option<String>,

    pub sale_date: NaiveDate,

    /// User id of the attendant who recorded the sale.
    pub recorded_by: String,

    pub created_at: DateTime<Utc>,
}

impl SaleEvent {
    /// Payment split as recorded.
    pub fn payments(&self) -> PaymentSplit {
        PaymentSplit::new(self.cash_amount, self.mobile_amount, self.credit_amount)
    }

    /// Profit for this sale at the given base-unit cost.
    pub fn profit(&self, buying_price: Money) -> Money {
        self.total_amount - buying_price.multiply_quantity(self.base_units)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product_with_stock(stock: i64, min: i64) -> Product {
        let now = Utc::now();
        Product {
            id: "p1".to_string(),
            name: "Jameson".to_string(),
            category: "Whiskey".to_string(),
            base_unit: "bottle".to_string(),
            buying_price: Money::from_cents(180000),
            current_stock: Quantity::from_hundredths(stock),
            min_stock_level: Quantity::from_hundredths(min),
            status: EntityStatus::Active,
            created_at: now,
            last_stock_update: now,
        }
    }

    #[test]
    fn test_stock_status_thresholds() {
        assert_eq!(product_with_stock(0, 500).stock_status(), StockStatus::OutOfStock);
        assert_eq!(product_with_stock(-100, 500).stock_status(), StockStatus::OutOfStock);
        assert_eq!(product_with_stock(300, 500).stock_status(), StockStatus::LowStock);
        assert_eq!(product_with_stock(500, 500).stock_status(), StockStatus::LowStock);
        assert_eq!(product_with_stock(800, 500).stock_status(), StockStatus::MediumStock);
        assert_eq!(product_with_stock(1000, 500).stock_status(), StockStatus::MediumStock);
        assert_eq!(product_with_stock(1001, 500).stock_status(), StockStatus::GoodStock);
    }

    #[test]
    fn test_available_stock_floors_negative() {
        let p = product_with_stock(-250, 500);
        assert_eq!(p.available_stock(), Quantity::zero());
        assert!(!p.can_cover(Quantity::from_hundredths(1)));
    }

    #[test]
    fn test_variant_base_units() {
        let now = Utc::now();
        let tot = ProductVariant {
            id: "v1".to_string(),
            product_id: "p1".to_string(),
            size_label: "Tot".to_string(),
            selling_price: Money::from_cents(15000),
            conversion_factor: Quantity::from_hundredths(10),
            sort_order: 1,
            status: EntityStatus::Active,
            created_at: now,
        };

        // 4 tots = 0.40 bottle
        assert_eq!(
            tot.base_units_for(Quantity::from_units(4)),
            Quantity::from_hundredths(40)
        );

        // 11.60 bottles serve 116 tots
        assert_eq!(tot.servable_units(Quantity::from_hundredths(1160)), 116);

        // profit per tot: 150.00 - (1800.00 × 0.10) = -30.00
        assert_eq!(
            tot.profit_per_unit(Money::from_cents(180000)).cents(),
            -3000
        );
    }

    #[test]
    fn test_derive_closing() {
        let (closing, clamped) = DailySnapshot::derive_closing(
            Quantity::from_units(10),
            Quantity::from_units(5),
            Quantity::from_units(3),
        );
        assert_eq!(closing, Quantity::from_units(12));
        assert!(!clamped);
    }

    #[test]
    fn test_derive_closing_clamps_negative() {
        let (closing, clamped) = DailySnapshot::derive_closing(
            Quantity::from_units(1),
            Quantity::zero(),
            Quantity::from_units(3),
        );
        assert_eq!(closing, Quantity::zero());
        assert!(clamped);
    }

    #[test]
    fn test_discount_amounts() {
        let original = Money::from_cents(30000);

        assert_eq!(Discount::None.amount(original), Money::zero());
        assert_eq!(Discount::Percentage(1000).amount(original).cents(), 3000);
        assert_eq!(
            Discount::Fixed(Money::from_cents(5000)).amount(original).cents(),
            5000
        );
        // Fixed discounts never exceed the original amount
        assert_eq!(
            Discount::Fixed(Money::from_cents(99999)).amount(original),
            original
        );
    }

    #[test]
    fn test_role_ceilings() {
        assert_eq!(Role::Attendant.max_discount_bps(), 1000);
        assert_eq!(Role::Manager.max_discount_bps(), 2500);
        assert_eq!(Role::Admin.max_discount_bps(), 10000);
        assert!(!Role::Attendant.can_touch_others_events());
        assert!(Role::Manager.can_touch_others_events());
    }

    #[test]
    fn test_payment_split() {
        let split = PaymentSplit::new(
            Money::from_cents(10000),
            Money::from_cents(5000),
            Money::from_cents(2000),
        );
        assert_eq!(split.total().cents(), 17000);
        assert!(split.has_credit());

        let cash_only = PaymentSplit::new(Money::from_cents(10000), Money::zero(), Money::zero());
        assert!(!cash_only.has_credit());
    }
}
