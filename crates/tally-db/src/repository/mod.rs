//! # Repository Module
//!
//! Database repository implementations for Tally Stock.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Engine service                                                        │
//! │       │                                                                 │
//! │       │  db.snapshots().get_by_product_date(id, date)                  │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  SnapshotRepository                                                    │
//! │  ├── get_by_product_date(&self, product_id, date)                      │
//! │  ├── insert(&self, snapshot)                                           │
//! │  └── update_computed(&self, snapshot)                                  │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • Clean separation of concerns                                        │
//! │  • SQL is isolated in one place                                        │
//! │  • Engine logic stays readable                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Product rows and the stock compare-and-swap
//! - [`variant::VariantRepository`] - Sellable serving definitions
//! - [`snapshot::SnapshotRepository`] - Per-day reconciliation rows
//! - [`purchase::PurchaseRepository`] - Stock delivery events
//! - [`sale::SaleRepository`] - Sale events

pub mod product;
pub mod purchase;
pub mod sale;
pub mod snapshot;
pub mod variant;
