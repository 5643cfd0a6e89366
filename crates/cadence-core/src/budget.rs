//! Abstract memory budget interfaces.
//!
//! The concrete implementation lives in `cadence-mem`. Map pages and slot
//! tables are accounted through these traits so that a map's memory can be
//! released and re-acquired independently of the cursor that uses it.

/// A guard returned by a memory budget when bytes are acquired.
///
/// It must be RAII (releases on Drop) and `Send`.
pub trait BudgetGuard: Send {
    /// Number of bytes currently accounted for by this guard.
    fn bytes(&self) -> usize;
    /// Debug tag naming the owner ("map-page", "map-index", ...).
    fn tag(&self) -> &'static str {
        "guard"
    }
}

/// A handle representing a memory-cap enforcer.
///
/// `try_acquire` returning `None` means the cap would be exceeded; the caller
/// turns that into an error rather than allocating anyway.
pub trait MemoryBudget: Send + Sync + 'static {
    type Guard: BudgetGuard;

    fn try_acquire(&self, bytes: usize, tag: &'static str) -> Option<Self::Guard>;

    /// Total configured capacity (bytes).
    fn capacity_bytes(&self) -> usize;

    /// Approximate currently used bytes (advisory; not a correctness API).
    fn used_bytes(&self) -> usize;
}
