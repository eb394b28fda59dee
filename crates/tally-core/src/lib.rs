//! # tally-core: Pure Business Logic for Tally Stock
//!
//! This crate is the **heart** of Tally Stock. It contains all business
//! logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Tally Stock Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    tally-engine (Services)                      │   │
//! │  │    Catalog ──► Stock Ledger ──► Snapshot Engine ──► Processor  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ quantity  │  │   money   │  │ validation│  │   │
//! │  │   │  Product  │  │ Quantity  │  │   Money   │  │   rules   │  │   │
//! │  │   │  Snapshot │  │ fixed-pt  │  │   cents   │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    tally-db (Database Layer)                    │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, ProductVariant, DailySnapshot, events)
//! - [`quantity`] - Fixed-point stock amounts (no floating point!)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Fixed-Point Everywhere**: Quantities in hundredths, money in cents
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::quantity::Quantity;
//! use tally_core::money::Money;
//! use tally_core::types::Discount;
//!
//! // 4 tots of a 1/10-bottle serving
//! let sold = Quantity::from_units(4);
//! let factor = Quantity::from_hundredths(10);
//! assert_eq!(sold.mul_factor(factor), Quantity::from_hundredths(40));
//!
//! // 10% off a 600.00 line
//! let original = Money::from_cents(60000);
//! assert_eq!(Discount::Percentage(1000).amount(original).cents(), 6000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod quantity;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use tally_core::Quantity` instead of
// `use tally_core::quantity::Quantity`

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use quantity::Quantity;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default minimum stock level for newly registered products, in base units.
///
/// ## Business Reason
/// A reorder threshold of five base units matches how the counting is done
/// on the shelf; products with different velocities override it.
pub const DEFAULT_MIN_STOCK_LEVEL: Quantity = Quantity::from_units(5);
