//! Exit countdown for worker pools
//!
//! Every pool hands each of its workers an [`ExitGuard`] sharing one
//! [`Countdown`] sized to the pool. The guard arrives on drop, so it fires on
//! every exit path including early returns and panics. The worker whose
//! guard brings the count to zero runs the pool's completion action exactly
//! once, typically closing the queue the pool feeds.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Number of workers of a pool that are still running
#[derive(Debug)]
pub struct Countdown {
    remaining: AtomicUsize,
}

impl Countdown {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
        }
    }

    /// Record one exit. Returns true for the exit that reached zero.
    /// Arrivals beyond the initial count are ignored.
    pub fn arrive(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map(|previous| previous == 1)
            .unwrap_or(false)
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }
}

/// Arrives at a [`Countdown`] when dropped and runs `on_last` if it was the
/// final arrival.
pub struct ExitGuard<F: FnOnce()> {
    countdown: Arc<Countdown>,
    on_last: Option<F>,
}

impl<F: FnOnce()> ExitGuard<F> {
    pub fn new(countdown: Arc<Countdown>, on_last: F) -> Self {
        Self {
            countdown,
            on_last: Some(on_last),
        }
    }
}

impl<F: FnOnce()> Drop for ExitGuard<F> {
    fn drop(&mut self) {
        if self.countdown.arrive() {
            if let Some(on_last) = self.on_last.take() {
                on_last();
            }
        }
    }
}
