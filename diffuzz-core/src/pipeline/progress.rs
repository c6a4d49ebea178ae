//! Periodic progress reporting and the cumulative test counter

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::state::RunState;
use crate::Result;

/// Plain-text file holding the number of tests executed across all runs
#[derive(Debug, Clone)]
pub struct CounterFile {
    path: PathBuf,
}

impl CounterFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current total. A missing or unparsable file counts as zero.
    pub async fn read(&self) -> u64 {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content.trim().parse().unwrap_or_else(|e| {
                debug!(path = %self.path.display(), error = %e, "Ignoring unparsable counter");
                0
            }),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "Counter file unavailable");
                0
            }
        }
    }

    /// Add `delta` to the stored total and return the new total.
    pub async fn add(&self, delta: u64) -> Result<u64> {
        let total = self.read().await.saturating_add(delta);
        tokio::fs::write(&self.path, total.to_string()).await?;
        Ok(total)
    }
}

/// One progress report
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    /// Tests executed in this run so far
    pub executed: u64,
    /// Tests executed since the previous report
    pub delta: u64,
    pub elapsed: Duration,
    /// Tests per second since the run started
    pub rate: f64,
    /// Tests executed across every run, if the counter could be updated
    pub cumulative: Option<u64>,
}

pub struct ProgressReporter {
    state: Arc<RunState>,
    counter: CounterFile,
    interval: Duration,
    started: Instant,
    last_executed: u64,
}

impl ProgressReporter {
    pub fn new(state: Arc<RunState>, counter: CounterFile, interval: Duration) -> Self {
        Self {
            state,
            counter,
            interval,
            started: Instant::now(),
            last_executed: 0,
        }
    }

    /// Report every interval until `shutdown` flips, then flush once more.
    pub fn spawn(mut self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.tick().await;
                    }
                    _ = shutdown.changed() => {
                        break;
                    }
                }
            }

            if self.state.executed() > self.last_executed {
                self.tick().await;
            }
            debug!("Progress reporter stopped");
        })
    }

    /// Take one report: log throughput and fold the delta into the counter.
    pub async fn tick(&mut self) -> ProgressSnapshot {
        let executed = self.state.executed();
        let delta = executed - self.last_executed;
        self.last_executed = executed;

        let elapsed = self.started.elapsed();
        let rate = if elapsed.is_zero() {
            0.0
        } else {
            executed as f64 / elapsed.as_secs_f64()
        };
        info!(
            "{} tests executed, in {:.1?} ({:.02} tests/s)",
            executed, elapsed, rate
        );

        let cumulative = match self.counter.add(delta).await {
            Ok(total) => Some(total),
            Err(e) => {
                warn!(
                    path = %self.counter.path().display(),
                    error = %e,
                    "Failed to update test counter"
                );
                None
            }
        };

        ProgressSnapshot {
            executed,
            delta,
            elapsed,
            rate,
            cumulative,
        }
    }
}
