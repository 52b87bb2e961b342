use std::sync::{Arc, Condvar, Mutex};

use crate::error::GraphError;

/// Shared RAM counter gating Stage-B tile materialization.
///
/// Workers call [`BudgetController::acquire`] before allocating a tile's
/// `ia`/`ja`/`a` arrays and [`BudgetController::release`] once the tile is
/// flushed to disk and dropped. A request that can never be satisfied — a
/// tile whose `alloc_need` exceeds the configured `ram_limit_bytes` — is
/// rejected immediately rather than blocking forever.
#[derive(Debug)]
pub struct BudgetController {
    remaining: Mutex<u64>,
    cv: Condvar,
    limit: u64,
}

impl BudgetController {
    /// Creates a new controller with the given total capacity in bytes.
    pub fn new(limit_bytes: u64) -> Arc<Self> {
        Arc::new(BudgetController {
            remaining: Mutex::new(limit_bytes),
            cv: Condvar::new(),
            limit: limit_bytes,
        })
    }

    /// Total capacity this controller was constructed with.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Blocks until `bytes` can be reserved, unless `bytes` exceeds the total
    /// limit, in which case it returns `BudgetExceeded` immediately — no
    /// amount of waiting would ever satisfy the request.
    pub fn acquire(&self, block_id: u64, bytes: u64) -> Result<(), GraphError> {
        if bytes > self.limit {
            return Err(GraphError::BudgetExceeded { block_id, needed: bytes, limit: self.limit });
        }
        let mut guard = self.remaining.lock().expect("budget mutex poisoned");
        while *guard < bytes {
            guard = self.cv.wait(guard).expect("budget mutex poisoned");
        }
        *guard -= bytes;
        if std::env::var("GRAPHEE_DEBUG_BUDGET").is_ok() {
            eprintln!("[budget] block {} acquired {} bytes, {} remaining", block_id, bytes, *guard);
        }
        Ok(())
    }

    /// Returns previously reserved bytes to the pool and wakes waiters.
    pub fn release(&self, bytes: u64) {
        let mut guard = self.remaining.lock().expect("budget mutex poisoned");
        *guard += bytes;
        if *guard > self.limit {
            *guard = self.limit;
        }
        if std::env::var("GRAPHEE_DEBUG_BUDGET").is_ok() {
            eprintln!("[budget] released {} bytes, {} remaining", bytes, *guard);
        }
        self.cv.notify_all();
    }
}
