//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  tally-engine errors (separate crate)                                  │
//! │  └── EngineError      - What callers of the services see               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → EngineError → Caller              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (product name, amounts, etc.)
//! 3. Errors are enum variants, never String
//! 4. Every rejected operation carries a specific, actionable reason

use thiserror::Error;

use crate::money::Money;
use crate::quantity::Quantity;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations. They are returned to
/// the caller synchronously, with no partial mutation performed.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A product with this name already exists.
    #[error("Product name '{0}' already exists")]
    DuplicateName(String),

    /// A variant with this size already exists for the product.
    #[error("Variant '{size_label}' already exists for product {product}")]
    DuplicateVariant { product: String, size_label: String },

    /// Conversion factor must be strictly positive.
    #[error("Conversion factor must be greater than zero, got {0}")]
    InvalidConversionFactor(Quantity),

    /// Insufficient stock to complete the operation.
    ///
    /// ## When This Occurs
    /// - Selling more base units than are available
    /// - Editing a sale upwards past what is left on the shelf
    /// - Reversing a purchase whose stock has already been sold
    ///
    /// The ledger is left unchanged — no partial reduction happens.
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: Quantity,
        requested: Quantity,
    },

    /// Quantity or price fails the positivity rules.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Tendered payments do not cover the sale total.
    #[error("Insufficient payment: total {total}, paid {paid}")]
    InsufficientPayment { total: Money, paid: Money },

    /// A credit component requires a named customer.
    #[error("Customer name is required for credit sales")]
    MissingCustomer,

    /// The acting user's role does not permit this discount.
    #[error("Role {role} may discount at most {max_bps} bps, requested {requested_bps} bps")]
    DiscountNotPermitted {
        role: String,
        max_bps: u32,
        requested_bps: u32,
    },

    /// Entity cannot be disabled while transactions reference it.
    #[error("{entity} '{name}' has {count} dependent records and cannot be disabled")]
    HasDependentRecords {
        entity: String,
        name: String,
        count: i64,
    },

    /// Attendants may only edit or reverse their own events.
    #[error("User {user} may not modify events recorded by {owner}")]
    NotEventOwner { user: String, owner: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when caller input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
