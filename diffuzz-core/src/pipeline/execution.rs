//! Execution pool: run every engine on each test and compare their outputs

use chrono::Utc;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::report::{Divergence, DivergenceCause, DivergenceReporter};
use super::state::RunState;
use crate::buffer::OutputBuffer;
use crate::comparator::{compare_outputs, Comparison};
use crate::config::ComparisonTopology;
use crate::engine::Engine;
use crate::latch::{Countdown, ExitGuard};
use crate::queue::WorkQueue;
use crate::Result;

/// Result of running one test through every engine
#[derive(Debug)]
pub enum Verdict {
    Agree,
    Diverge(Box<Divergence>),
}

/// Spawns execution workers draining the pending-tests queue
pub struct ExecutionPool {
    engines: Arc<Vec<Arc<dyn Engine>>>,
    scratch_dir: PathBuf,
    topology: ComparisonTopology,
    workers: usize,
}

impl ExecutionPool {
    pub fn new(
        engines: Vec<Arc<dyn Engine>>,
        scratch_dir: impl Into<PathBuf>,
        topology: ComparisonTopology,
        workers: usize,
    ) -> Self {
        Self {
            engines: Arc::new(engines),
            scratch_dir: scratch_dir.into(),
            topology,
            workers,
        }
    }

    /// Start the workers. The last worker to exit closes `cleanup` and
    /// releases producers still waiting on `pending`.
    pub fn spawn(
        self,
        pending: Arc<WorkQueue<PathBuf>>,
        cleanup: Arc<WorkQueue<PathBuf>>,
        reporter: DivergenceReporter,
        state: Arc<RunState>,
    ) -> Vec<JoinHandle<()>> {
        info!(
            workers = self.workers,
            engines = self.engines.len(),
            topology = %self.topology,
            "Starting execution pool"
        );
        let countdown = Arc::new(Countdown::new(self.workers));

        (0..self.workers)
            .map(|worker| {
                let executor = ExecutionWorker {
                    worker,
                    engines: self.engines.clone(),
                    scratch_dir: self.scratch_dir.clone(),
                    topology: self.topology,
                    pending: pending.clone(),
                    cleanup: cleanup.clone(),
                    reporter: reporter.clone(),
                    state: state.clone(),
                };
                let countdown = countdown.clone();
                tokio::spawn(executor.run(countdown))
            })
            .collect()
    }
}

struct ExecutionWorker {
    worker: usize,
    engines: Arc<Vec<Arc<dyn Engine>>>,
    scratch_dir: PathBuf,
    topology: ComparisonTopology,
    pending: Arc<WorkQueue<PathBuf>>,
    cleanup: Arc<WorkQueue<PathBuf>>,
    reporter: DivergenceReporter,
    state: Arc<RunState>,
}

impl ExecutionWorker {
    async fn run(self, countdown: Arc<Countdown>) {
        let _exit = {
            let pending = self.pending.clone();
            let cleanup = self.cleanup.clone();
            ExitGuard::new(countdown, move || {
                info!(queue = cleanup.name(), "Last executor exited, closing queue");
                cleanup.close();
                pending.close_receiving();
            })
        };

        let mut buffers = match self.open_buffers().await {
            Ok(buffers) => buffers,
            Err(e) => {
                error!(worker = self.worker, error = %e, "Failed to open output buffers");
                return;
            }
        };
        info!(worker = self.worker, "Fuzzing started");

        let mut executed = 0u64;
        while !self.state.is_aborted() {
            let Some(artifact) = self.pending.recv().await else {
                debug!(worker = self.worker, "Pending queue drained");
                break;
            };
            if self.state.is_aborted() {
                self.discard(artifact).await;
                break;
            }

            match self.execute(&artifact, &mut buffers).await {
                Verdict::Agree => {
                    executed += 1;
                    self.discard(artifact).await;
                }
                Verdict::Diverge(divergence) => {
                    executed += 1;
                    self.state.abort();
                    warn!(
                        worker = self.worker,
                        artifact = %divergence.artifact.display(),
                        left = %divergence.left_engine,
                        right = %divergence.right_engine,
                        cause = %divergence.cause,
                        "Outputs diverged, stopping executor"
                    );
                    self.reporter.publish(*divergence);
                    break;
                }
            }
        }

        info!(worker = self.worker, executed, "Executor stopped");
    }

    async fn open_buffers(&self) -> Result<Vec<OutputBuffer>> {
        let mut buffers = Vec::with_capacity(self.engines.len());
        for engine in self.engines.iter() {
            buffers.push(OutputBuffer::open(&self.scratch_dir, engine.name(), self.worker).await?);
        }
        Ok(buffers)
    }

    /// Hand a test that needs no preservation to the cleanup worker.
    async fn discard(&self, artifact: PathBuf) {
        if let Err(closed) = self.cleanup.send(artifact).await {
            warn!(artifact = %closed.0.display(), "Cleanup queue closed, leaving test on disk");
        }
    }

    async fn execute(&self, artifact: &Path, buffers: &mut [OutputBuffer]) -> Verdict {
        trace!(worker = self.worker, artifact = %artifact.display(), "Executing test");

        let verdict = match self.run_engines(artifact, buffers).await {
            Ok(()) => self.compare(artifact, buffers).await,
            Err(e) => Verdict::Diverge(Box::new(self.divergence(
                artifact,
                buffers,
                (0, buffers.len().saturating_sub(1)),
                DivergenceCause::Unreadable {
                    error: e.to_string(),
                },
            ))),
        };

        let total = self.state.record_execution();
        trace!(worker = self.worker, total, "Test compared");
        verdict
    }

    /// Reset every buffer, then run all engines concurrently and wait for
    /// the slowest one.
    async fn run_engines(&self, artifact: &Path, buffers: &mut [OutputBuffer]) -> Result<()> {
        for buffer in buffers.iter_mut() {
            buffer.reset().await?;
        }

        let runs = self
            .engines
            .iter()
            .zip(buffers.iter_mut())
            .map(|(engine, buffer)| async move {
                let result = engine.run(artifact, buffer.sink()).await;
                (engine.name(), result)
            });

        for (engine, result) in join_all(runs).await {
            if let Err(e) = result {
                warn!(
                    worker = self.worker,
                    engine,
                    artifact = %artifact.display(),
                    error = %e,
                    "Engine run failed"
                );
            }
        }
        Ok(())
    }

    async fn compare(&self, artifact: &Path, buffers: &mut [OutputBuffer]) -> Verdict {
        for (a, b) in self.topology.pairs(buffers.len()) {
            let (left, right) = pair_mut(buffers, a, b);
            let comparison = match rewind_both(left, right).await {
                Ok(()) => compare_outputs(left.reader(), right.reader()).await,
                Err(e) => Err(e),
            };

            let cause = match comparison {
                Ok(Comparison::Equal { .. }) => continue,
                Ok(Comparison::Mismatch(mismatch)) => DivergenceCause::Mismatch(mismatch),
                Err(e) => DivergenceCause::Unreadable {
                    error: e.to_string(),
                },
            };
            return Verdict::Diverge(Box::new(self.divergence(artifact, buffers, (a, b), cause)));
        }
        Verdict::Agree
    }

    fn divergence(
        &self,
        artifact: &Path,
        buffers: &[OutputBuffer],
        (a, b): (usize, usize),
        cause: DivergenceCause,
    ) -> Divergence {
        Divergence {
            artifact: artifact.to_path_buf(),
            left_engine: buffers[a].engine().to_string(),
            right_engine: buffers[b].engine().to_string(),
            cause,
            outputs: buffers.iter().map(|b| b.path().to_path_buf()).collect(),
            worker: self.worker,
            detected_at: Utc::now(),
        }
    }
}

async fn rewind_both(left: &mut OutputBuffer, right: &mut OutputBuffer) -> Result<()> {
    left.rewind().await?;
    right.rewind().await
}

/// Two distinct mutable elements of a slice, `a < b`
fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    debug_assert!(a < b);
    let (head, tail) = items.split_at_mut(b);
    (&mut head[a], &mut tail[0])
}
