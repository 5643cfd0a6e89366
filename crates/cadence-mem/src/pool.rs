//! Budgeted byte pages.
//!
//! Map key heaps are built from fixed-capacity pages. A page accounts its full
//! capacity up front, so appending never touches the budget again.

use std::ops::{Deref, DerefMut};

use cadence_core::budget::{BudgetGuard, MemoryBudget};

use crate::error::{Error, Result};
use crate::guard::{BudgetGuardImpl, MemoryBudgetImpl};

/// Owned byte page that returns its accounted bytes on drop via the guard.
pub struct OwnedBuf {
    guard: BudgetGuardImpl,
    buf: Vec<u8>,
}

impl OwnedBuf {
    /// Create a page with capacity `cap` and length 0, accounting against `budget`.
    pub fn with_capacity(
        budget: &impl MemoryBudget<Guard = BudgetGuardImpl>,
        cap: usize,
        tag: &'static str,
    ) -> Result<Self> {
        let guard = budget
            .try_acquire(cap, tag)
            .ok_or_else(|| Error::BudgetExceeded {
                tag,
                requested: cap,
                capacity: budget.capacity_bytes(),
                used: budget.used_bytes(),
            })?;

        Ok(Self {
            guard,
            buf: Vec::with_capacity(cap),
        })
    }

    /// Current accounted size (bytes).
    pub fn accounted_bytes(&self) -> usize {
        self.guard.bytes()
    }

    /// Bytes still appendable without exceeding the accounted capacity.
    pub fn remaining(&self) -> usize {
        self.guard.bytes() - self.buf.len()
    }

    /// Append `bytes` followed by `zeroes` zero bytes; returns the start offset,
    /// or `None` if the page has no room.
    pub fn append(&mut self, bytes: &[u8], zeroes: usize) -> Option<usize> {
        if bytes.len() + zeroes > self.remaining() {
            return None;
        }
        let start = self.buf.len();
        self.buf.extend_from_slice(bytes);
        self.buf.resize(start + bytes.len() + zeroes, 0);
        Some(start)
    }

    /// Forget the contents but keep the page (and its accounting).
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl Deref for OwnedBuf {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl DerefMut for OwnedBuf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

/// Page allocator bound to one budget. Cheap to clone.
#[derive(Clone, Debug)]
pub struct BufferPool {
    budget: MemoryBudgetImpl,
}

impl BufferPool {
    pub fn new(budget: MemoryBudgetImpl) -> Self {
        Self { budget }
    }

    pub fn alloc_page(&self, cap: usize, tag: &'static str) -> Result<OwnedBuf> {
        OwnedBuf::with_capacity(&self.budget, cap, tag)
    }

    /// Bare guard for memory held outside pages (slot tables).
    pub fn acquire(&self, bytes: usize, tag: &'static str) -> Result<BudgetGuardImpl> {
        self.budget
            .try_acquire(bytes, tag)
            .ok_or_else(|| Error::BudgetExceeded {
                tag,
                requested: bytes,
                capacity: self.budget.capacity_bytes(),
                used: self.budget.used_bytes(),
            })
    }

    pub fn budget(&self) -> &MemoryBudgetImpl {
        &self.budget
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_stays_within_page() {
        let pool = BufferPool::new(MemoryBudgetImpl::new(1024));
        let mut page = pool.alloc_page(16, "test").unwrap();
        assert_eq!(page.append(b"abcd", 4), Some(0));
        assert_eq!(page.append(b"ef", 0), Some(8));
        assert_eq!(&page[..10], b"abcd\0\0\0\0ef");
        assert_eq!(page.append(&[1u8; 7], 0), None);
        assert_eq!(page.remaining(), 6);
        page.clear();
        assert_eq!(page.remaining(), 16);
        assert_eq!(pool.budget().used_bytes(), 16);
        drop(page);
        assert_eq!(pool.budget().used_bytes(), 0);
    }

    #[test]
    fn page_refused_over_budget() {
        let pool = BufferPool::new(MemoryBudgetImpl::new(8));
        assert!(matches!(
            pool.alloc_page(16, "test"),
            Err(Error::BudgetExceeded { requested: 16, .. })
        ));
    }
}
