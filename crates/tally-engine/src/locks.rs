//! # Per-Product Locks
//!
//! Serializes the critical sections that touch one product's shared state.
//!
//! ## Locking Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Per-Product Serialization                            │
//! │                                                                         │
//! │  Attendant A: sale on product P ──┐                                    │
//! │  Attendant B: sale on product P ──┼──► ProductLocks.acquire("P")       │
//! │                                   │    (one at a time)                  │
//! │  Attendant C: sale on product Q ──┴──► ProductLocks.acquire("Q")       │
//! │                                        (proceeds in parallel)           │
//! │                                                                         │
//! │  The stock decrement itself is already an atomic guarded UPDATE;       │
//! │  this lock exists for the snapshot recompute, which reads the full     │
//! │  event set and writes one row. That sequence is idempotent but not     │
//! │  safely interleavable mid-write.                                       │
//! │                                                                         │
//! │  Scope: one product/date flow per acquisition. Never held across       │
//! │  unrelated products — multi-product operations are out of scope.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A map of per-product async mutexes.
///
/// Lock entries are created on first use and kept for the process
/// lifetime; the set of products is small and bounded by the catalog.
#[derive(Debug, Default)]
pub struct ProductLocks {
    inner: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ProductLocks {
    pub fn new() -> Self {
        ProductLocks::default()
    }

    /// Acquires the lock for one product, waiting if another flow holds it.
    ///
    /// The guard is owned, so it can be held across `.await` points for
    /// the duration of a sale/purchase/recompute flow.
    pub async fn acquire(&self, product_id: &str) -> OwnedMutexGuard<()> {
        let entry = {
            // The table mutex only guards the HashMap itself; no await
            // happens while it is held.
            let mut table = self.inner.lock().expect("product lock table poisoned");
            table
                .entry(product_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        entry.lock_owned().await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
