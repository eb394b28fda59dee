//! # Engine Error Types
//!
//! The error surface callers of the services see.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  ValidationError ──► CoreError ──┐                                     │
//! │                                  ├──► EngineError ──► Caller           │
//! │  sqlx::Error ──► DbError ────────┘                                     │
//! │                                                                         │
//! │  Business rule violations arrive as EngineError::Core and carry the   │
//! │  specific taxonomy variant (InsufficientStock, DuplicateName, ...).   │
//! │  Infrastructure failures arrive as EngineError::Db.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use tally_core::{CoreError, ValidationError};
use tally_db::DbError;

/// Errors returned by the engine services.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Business rule violation. No partial mutation was performed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Database operation failure.
    #[error(transparent)]
    Db(#[from] DbError),

    /// Referenced entity does not exist or is disabled.
    #[error("{entity} not found or inactive: {id}")]
    NotFound { entity: String, id: String },
}

impl EngineError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Core(CoreError::Validation(err))
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Unit Tests
// =============================================================================
