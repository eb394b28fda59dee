//! # Catalog Service
//!
//! Product and variant definitions. Leaf component: everything above it
//! consumes the validated entities it produces.
//!
//! ## Disable Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │            One Guard For Every Entity Kind                              │
//! │                                                                         │
//! │  disable_product(P)  ──► count sales + purchases referencing P          │
//! │  disable_variant(V)  ──► count sales referencing V                      │
//! │            │                                                            │
//! │            ▼                                                            │
//! │  count > 0 → HasDependentRecords (refuse)                              │
//! │  count = 0 → status = Disabled (rows kept, history intact)             │
//! │                                                                         │
//! │  Entities with transaction history are never deletable, only          │
//! │  disableable, and only once nothing references them.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditEvent, AuditSink};
use crate::error::{EngineError, EngineResult};
use tally_core::{
    validation, ActingUser, CoreError, DailySnapshot, EntityStatus, Money, Product,
    ProductVariant, Quantity, DEFAULT_MIN_STOCK_LEVEL,
};
use tally_db::{DbError, Database};

// =============================================================================
// Requests
// =============================================================================

/// Input for registering a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub base_unit: String,
    pub buying_price: Money,
    /// Base units on the shelf at registration time.
    pub opening_stock: Quantity,
    /// Reorder threshold; defaults to [`DEFAULT_MIN_STOCK_LEVEL`].
    pub min_stock_level: Option<Quantity>,
}

/// Input for adding a variant to a product.
#[derive(Debug, Clone)]
pub struct NewVariant {
    pub size_label: String,
    pub selling_price: Money,
    /// Base units one variant unit represents. May be below 1.00.
    pub conversion_factor: Quantity,
    pub sort_order: i64,
}

// =============================================================================
// Catalog
// =============================================================================

/// Catalog operations: registration, variants, disabling.
#[derive(Clone)]
pub struct Catalog {
    db: Database,
    audit: Arc<dyn AuditSink>,
}

impl Catalog {
    pub fn new(db: Database, audit: Arc<dyn AuditSink>) -> Self {
        Catalog { db, audit }
    }

    /// Registers a new product.
    ///
    /// ## Errors
    /// * `DuplicateName` - a product with this name already exists
    ///
    /// A positive opening stock also materializes a day-zero snapshot
    /// (`opening = closing = opening_stock`) so the first reconciliation
    /// day starts from the registered amount.
    pub async fn register_product(
        &self,
        new: NewProduct,
        user: &ActingUser,
    ) -> EngineResult<Product> {
        let name = validation::validate_product_name(&new.name)?;
        let category = validation::validate_category(&new.category)?;
        let base_unit = validation::validate_base_unit(&new.base_unit)?;
        validation::validate_buying_price(new.buying_price)?;
        validation::validate_non_negative_quantity("opening_stock", new.opening_stock)?;

        if self.db.products().get_by_name(&name).await?.is_some() {
            return Err(EngineError::Core(CoreError::DuplicateName(name)));
        }

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name,
            category,
            base_unit,
            buying_price: new.buying_price,
            current_stock: new.opening_stock,
            min_stock_level: new.min_stock_level.unwrap_or(DEFAULT_MIN_STOCK_LEVEL),
            status: EntityStatus::Active,
            created_at: now,
            last_stock_update: now,
        };

        // The UNIQUE index backs up the pre-check under concurrency.
        self.db.products().insert(&product).await.map_err(|e| match e {
            DbError::UniqueViolation { .. } => {
                EngineError::Core(CoreError::DuplicateName(product.name.clone()))
            }
            other => EngineError::Db(other),
        })?;

        if new.opening_stock.is_positive() {
            let snapshot = DailySnapshot {
                id: Uuid::new_v4().to_string(),
                product_id: product.id.clone(),
                date: now.date_naive(),
                opening_stock: new.opening_stock,
                additions: Quantity::zero(),
                sales_quantity: Quantity::zero(),
                closing_stock: new.opening_stock,
                updated_by: Some(user.id.clone()),
                updated_at: now,
            };
            self.db.snapshots().insert(&snapshot).await?;
        }

        info!(name = %product.name, opening = %product.current_stock, "Product registered");

        self.audit.record(
            AuditEvent::new(
                AuditAction::Create,
                "product",
                &product.id,
                user,
                format!(
                    "New product: {} ({}, {} @ {} per {}, opening stock {})",
                    product.name,
                    product.category,
                    product.base_unit,
                    product.buying_price,
                    product.base_unit,
                    product.current_stock
                ),
            )
            .with_new(&product),
        );

        Ok(product)
    }

    /// Adds a sellable variant to a product.
    ///
    /// ## Errors
    /// * `InvalidConversionFactor` - factor ≤ 0
    /// * `DuplicateVariant` - (product, size_label) already exists
    pub async fn add_variant(
        &self,
        product_id: &str,
        new: NewVariant,
        user: &ActingUser,
    ) -> EngineResult<ProductVariant> {
        let size_label = validation::validate_size_label(&new.size_label)?;
        validation::validate_positive_price("selling_price", new.selling_price)?;

        if !new.conversion_factor.is_positive() {
            return Err(EngineError::Core(CoreError::InvalidConversionFactor(
                new.conversion_factor,
            )));
        }

        let product = self.active_product(product_id).await?;

        if self
            .db
            .variants()
            .get_by_product_size(&product.id, &size_label)
            .await?
            .is_some()
        {
            return Err(EngineError::Core(CoreError::DuplicateVariant {
                product: product.name,
                size_label,
            }));
        }

        let variant = ProductVariant {
            id: Uuid::new_v4().to_string(),
            product_id: product.id.clone(),
            size_label,
            selling_price: new.selling_price,
            conversion_factor: new.conversion_factor,
            sort_order: new.sort_order,
            status: EntityStatus::Active,
            created_at: Utc::now(),
        };

        self.db.variants().insert(&variant).await.map_err(|e| match e {
            DbError::UniqueViolation { .. } => EngineError::Core(CoreError::DuplicateVariant {
                product: product.name.clone(),
                size_label: variant.size_label.clone(),
            }),
            other => EngineError::Db(other),
        })?;

        info!(
            product = %product.name,
            size = %variant.size_label,
            factor = %variant.conversion_factor,
            "Variant added"
        );

        self.audit.record(
            AuditEvent::new(
                AuditAction::Create,
                "product_variant",
                &variant.id,
                user,
                format!(
                    "New variant: {} - {} (factor {}, price {})",
                    product.name, variant.size_label, variant.conversion_factor, variant.selling_price
                ),
            )
            .with_new(&variant),
        );

        Ok(variant)
    }

    /// Active variants of a product in display order.
    pub async fn active_variants(&self, product_id: &str) -> EngineResult<Vec<ProductVariant>> {
        Ok(self.db.variants().list_active_for_product(product_id).await?)
    }

    /// Updates a variant's selling price.
    pub async fn update_variant_price(
        &self,
        variant_id: &str,
        selling_price: Money,
        user: &ActingUser,
    ) -> EngineResult<ProductVariant> {
        validation::validate_positive_price("selling_price", selling_price)?;

        let old = self
            .db
            .variants()
            .get_by_id(variant_id)
            .await?
            .ok_or_else(|| EngineError::not_found("ProductVariant", variant_id))?;

        self.db.variants().update_price(variant_id, selling_price).await?;

        let mut updated = old.clone();
        updated.selling_price = selling_price;

        self.audit.record(
            AuditEvent::new(
                AuditAction::Update,
                "product_variant",
                variant_id,
                user,
                format!(
                    "Variant price changed: {} {} → {}",
                    old.size_label, old.selling_price, selling_price
                ),
            )
            .with_old(&old)
            .with_new(&updated),
        );

        Ok(updated)
    }

    /// Disables a product.
    ///
    /// ## Errors
    /// * `HasDependentRecords` - sales or purchases reference the product
    pub async fn disable_product(&self, product_id: &str, user: &ActingUser) -> EngineResult<()> {
        let product = self
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Product", product_id))?;

        let dependents = self.db.sales().count_for_product(product_id).await?
            + self.db.purchases().count_for_product(product_id).await?;
        ensure_no_dependents("Product", &product.name, dependents)?;

        self.db.products().set_status(product_id, EntityStatus::Disabled).await?;

        info!(name = %product.name, "Product disabled");

        self.audit.record(
            AuditEvent::new(
                AuditAction::Update,
                "product",
                product_id,
                user,
                format!("Product disabled: {}", product.name),
            )
            .with_old(&product),
        );

        Ok(())
    }

    /// Disables a variant.
    ///
    /// ## Errors
    /// * `HasDependentRecords` - sales reference the variant
    pub async fn disable_variant(&self, variant_id: &str, user: &ActingUser) -> EngineResult<()> {
        let variant = self
            .db
            .variants()
            .get_by_id(variant_id)
            .await?
            .ok_or_else(|| EngineError::not_found("ProductVariant", variant_id))?;

        let dependents = self.db.sales().count_for_variant(variant_id).await?;
        ensure_no_dependents("ProductVariant", &variant.size_label, dependents)?;

        self.db.variants().set_status(variant_id, EntityStatus::Disabled).await?;

        info!(size = %variant.size_label, "Variant disabled");

        self.audit.record(
            AuditEvent::new(
                AuditAction::Update,
                "product_variant",
                variant_id,
                user,
                format!("Variant disabled: {}", variant.size_label),
            )
            .with_old(&variant),
        );

        Ok(())
    }

    /// Fetches a product, requiring it to exist and be active.
    pub(crate) async fn active_product(&self, product_id: &str) -> EngineResult<Product> {
        let product = self
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Product", product_id))?;

        if product.status != EntityStatus::Active {
            return Err(EngineError::not_found("Product", product_id));
        }

        Ok(product)
    }
}

/// The shared referential-integrity guard: an entity with dependent
/// transaction history cannot be disabled, whatever its kind.
fn ensure_no_dependents(entity: &str, name: &str, count: i64) -> EngineResult<()> {
    if count > 0 {
        return Err(EngineError::Core(CoreError::HasDependentRecords {
            entity: entity.to_string(),
            name: name.to_string(),
            count,
        }));
    }
    Ok(())
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

    fn admin() -> ActingUser {
        ActingUser::new("u-admin", "Asha", Role::Admin)
    }

    fn new_product(name: &str, opening: i64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            category: "Whiskey".to_string(),
            base_unit: "bottle".to_string(),
            buying_price: Money::from_cents(180000),
            opening_stock: Quantity::from_hundredths(opening),
            min_stock_level: None,
        }
    }

    async fn setup() -> (Database, Catalog, Arc<RecordingAuditSink>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sink = Arc::new(RecordingAuditSink::new());
        let catalog = Catalog::new(db.clone(), sink.clone());
        (db, catalog, sink)
    }

    #[tokio::test]
    async fn test_register_product_with_day_zero_snapshot() {
        let (db, catalog, sink) = setup().await;

        let product = catalog
            .register_product(new_product("Jameson 750ml", 1000), &admin())
            .await
            .unwrap();

        assert_eq!(product.current_stock, Quantity::from_units(10));
        assert_eq!(product.min_stock_level, DEFAULT_MIN_STOCK_LEVEL);

        let today = Utc::now().date_naive();
        let snapshot = db
            .snapshots()
            .get_by_product_date(&product.id, today)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.opening_stock, Quantity::from_units(10));
        assert_eq!(snapshot.closing_stock, Quantity::from_units(10));

        assert_eq!(sink.events().len(), 1);
        assert_eq!(sink.events()[0].action, AuditAction::Create);
    }

    #[tokio::test]
    async fn test_register_zero_stock_skips_snapshot() {
        let (db, catalog, _sink) = setup().await;

        let product = catalog
            .register_product(new_product("Tusker 500ml", 0), &admin())
            .await
            .unwrap();

        let today = Utc::now().date_naive();
        assert!(db
            .snapshots()
            .get_by_product_date(&product.id, today)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let (_db, catalog, _sink) = setup().await;

        catalog
            .register_product(new_product("Jameson 750ml", 0), &admin())
            .await
            .unwrap();

        let err = catalog
            .register_product(new_product("Jameson 750ml", 500), &admin())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::DuplicateName(_))));
    }

    #[tokio::test]
    async fn test_add_variant_rules() {
        let (_db, catalog, _sink) = setup().await;
        let product = catalog
            .register_product(new_product("Jameson 750ml", 1000), &admin())
            .await
            .unwrap();

        // Non-positive factor rejected
        let err = catalog
            .add_variant(
                &product.id,
                NewVariant {
                    size_label: "Tot".to_string(),
                    selling_price: Money::from_cents(15000),
                    conversion_factor: Quantity::zero(),
                    sort_order: 1,
                },
                &admin(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InvalidConversionFactor(_))
        ));

        catalog
            .add_variant(
                &product.id,
                NewVariant {
                    size_label: "Tot".to_string(),
                    selling_price: Money::from_cents(15000),
                    conversion_factor: Quantity::from_hundredths(10),
                    sort_order: 1,
                },
                &admin(),
            )
            .await
            .unwrap();

        // Same (product, size) rejected
        let err = catalog
            .add_variant(
                &product.id,
                NewVariant {
                    size_label: "Tot".to_string(),
                    selling_price: Money::from_cents(16000),
                    conversion_factor: Quantity::from_hundredths(10),
                    sort_order: 2,
                },
                &admin(),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::DuplicateVariant { .. })
        ));
    }

    #[tokio::test]
    async fn test_active_variants_ordering() {
        let (_db, catalog, _sink) = setup().await;
        let product = catalog
            .register_product(new_product("Jameson 750ml", 1000), &admin())
            .await
            .unwrap();

        for (label, factor, order) in [("Tot", 10, 2), ("Full Bottle", 100, 0), ("Half", 50, 1)] {
            catalog
                .add_variant(
                    &product.id,
                    NewVariant {
                        size_label: label.to_string(),
                        selling_price: Money::from_cents(15000),
                        conversion_factor: Quantity::from_hundredths(factor),
                        sort_order: order,
                    },
                    &admin(),
                )
                .await
                .unwrap();
        }

        let variants = catalog.active_variants(&product.id).await.unwrap();
        let labels: Vec<&str> = variants.iter().map(|v| v.size_label.as_str()).collect();
        assert_eq!(labels, vec!["Full Bottle", "Half", "Tot"]);
    }

    #[tokio::test]
    async fn test_disable_without_dependents() {
        let (db, catalog, _sink) = setup().await;
        let product = catalog
            .register_product(new_product("Jameson 750ml", 0), &admin())
            .await
            .unwrap();

        catalog.disable_product(&product.id, &admin()).await.unwrap();

        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.status, EntityStatus::Disabled);

        // Disabled products are invisible to the catalog's active lookup
        assert!(catalog.active_product(&product.id).await.is_err());
    }
}
