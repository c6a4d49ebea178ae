//! Scalars shared by every worker of one run

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Abort flag and run counters, handed to each worker at spawn time
#[derive(Debug, Default)]
pub struct RunState {
    aborted: AtomicBool,
    executed: AtomicU64,
    issued: AtomicU64,
    deleted: AtomicU64,
    max_tests: Option<u64>,
}

impl RunState {
    pub fn new(max_tests: Option<u64>) -> Self {
        Self {
            max_tests,
            ..Self::default()
        }
    }

    /// Ask every worker loop to stop before its next iteration
    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Reserve one test from the run budget. Always succeeds without a budget.
    pub fn claim_test(&self) -> bool {
        match self.max_tests {
            None => {
                self.issued.fetch_add(1, Ordering::AcqRel);
                true
            }
            Some(max) => self
                .issued
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    (n < max).then_some(n + 1)
                })
                .is_ok(),
        }
    }

    /// True once a configured budget has been handed out in full. Always
    /// false for an unbounded run.
    pub fn budget_exhausted(&self) -> bool {
        self.max_tests.is_some_and(|max| self.issued() >= max)
    }

    /// Count one test that was executed by every engine and compared.
    /// Returns the new total.
    pub fn record_execution(&self) -> u64 {
        self.executed.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Acquire)
    }

    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Acquire)
    }

    pub fn record_deletion(&self) {
        self.deleted.fetch_add(1, Ordering::AcqRel);
    }

    pub fn deleted(&self) -> u64 {
        self.deleted.load(Ordering::Acquire)
    }
}
