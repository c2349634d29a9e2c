//! Memory budgets for inflight frames.
//!
//! Per-connection and global budgets bound how much frame memory can be
//! held at once, so a burst of large uploads degrades into refusals rather
//! than memory exhaustion.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Atomic counter tracking usage against a limit.
pub struct Budget {
    limit: usize,
    used: AtomicUsize,
}

impl Budget {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            used: AtomicUsize::new(0),
        }
    }

    /// Reserve `n` bytes. The returned guard releases them on drop.
    pub fn try_reserve(self: &Arc<Self>, n: usize) -> Option<BudgetGuard> {
        loop {
            let cur = self.used.load(Ordering::Relaxed);
            let new = cur.checked_add(n)?;
            if new > self.limit {
                return None;
            }
            if self
                .used
                .compare_exchange(cur, new, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                return Some(BudgetGuard {
                    b: Arc::clone(self),
                    n,
                });
            }
        }
    }

    fn release(&self, n: usize) {
        self.used.fetch_sub(n, Ordering::AcqRel);
    }
}

/// RAII guard for reserved budget bytes.
pub struct BudgetGuard {
    b: Arc<Budget>,
    n: usize,
}

impl Drop for BudgetGuard {
    fn drop(&mut self) {
        self.b.release(self.n);
    }
}

/// A frame buffer whose budget reservations live as long as the buffer.
pub struct OwnedFrame {
    buf: Vec<u8>,
    _conn: BudgetGuard,
    _global: BudgetGuard,
}

impl OwnedFrame {
    pub fn new(buf: Vec<u8>, conn: BudgetGuard, global: BudgetGuard) -> Self {
        Self {
            buf,
            _conn: conn,
            _global: global,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_and_release() {
        let b = Arc::new(Budget::new(100));
        let g1 = b.try_reserve(60).unwrap();
        assert!(b.try_reserve(60).is_none());
        drop(g1);
        assert!(b.try_reserve(60).is_some());
    }
}
