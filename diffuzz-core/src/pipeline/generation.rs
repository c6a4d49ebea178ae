//! Generator pool: generate, store and enqueue test artifacts

use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::state::RunState;
use crate::engine::TestGenerator;
use crate::latch::{Countdown, ExitGuard};
use crate::queue::{QueueClosed, WorkQueue};
use crate::store::{test_name, TestStore};
use crate::Result;

/// Spawns generator workers that feed the pending-tests queue
pub struct GeneratorPool<G: TestGenerator> {
    generator: Arc<G>,
    store: TestStore,
    label: String,
    workers: usize,
}

impl<G: TestGenerator> GeneratorPool<G> {
    pub fn new(generator: Arc<G>, store: TestStore, label: impl Into<String>, workers: usize) -> Self {
        Self {
            generator,
            store,
            label: label.into(),
            workers,
        }
    }

    /// Start the workers. The last worker to exit closes `pending`.
    pub fn spawn(
        self,
        pending: Arc<WorkQueue<PathBuf>>,
        state: Arc<RunState>,
    ) -> Vec<JoinHandle<()>> {
        info!(workers = self.workers, "Starting generator pool");
        let countdown = Arc::new(Countdown::new(self.workers));

        (0..self.workers)
            .map(|worker| {
                let generator = GeneratorWorker {
                    worker,
                    generator: self.generator.clone(),
                    store: self.store.clone(),
                    label: self.label.clone(),
                    pending: pending.clone(),
                    state: state.clone(),
                };
                let countdown = countdown.clone();
                tokio::spawn(generator.run(countdown))
            })
            .collect()
    }
}

struct GeneratorWorker<G: TestGenerator> {
    worker: usize,
    generator: Arc<G>,
    store: TestStore,
    label: String,
    pending: Arc<WorkQueue<PathBuf>>,
    state: Arc<RunState>,
}

impl<G: TestGenerator> GeneratorWorker<G> {
    async fn run(self, countdown: Arc<Countdown>) {
        let _exit = {
            let pending = self.pending.clone();
            ExitGuard::new(countdown, move || {
                info!(queue = pending.name(), "Last generator exited, closing queue");
                pending.close();
            })
        };

        let mut sequence = 0u64;
        while !self.state.is_aborted() {
            if !self.state.claim_test() {
                debug!(worker = self.worker, "Test budget exhausted");
                break;
            }

            let name = test_name(sequence, &self.label, self.worker);
            sequence += 1;

            let artifact = match self.produce(name.clone()).await {
                Ok(artifact) => artifact,
                Err(e) => {
                    error!(
                        worker = self.worker,
                        test = %name,
                        error = %e,
                        "Failed to generate test, stopping generator"
                    );
                    break;
                }
            };

            trace!(worker = self.worker, artifact = %artifact.display(), "Enqueueing test");
            if let Err(QueueClosed(artifact)) = self.pending.send(artifact).await {
                debug!(
                    worker = self.worker,
                    artifact = %artifact.display(),
                    "Execution stopped, discarding test"
                );
                if let Err(e) = tokio::fs::remove_file(&artifact).await {
                    warn!(artifact = %artifact.display(), error = %e, "Failed to remove unused test");
                }
                break;
            }
        }

        info!(worker = self.worker, generated = sequence, "Generator stopped");
    }

    /// Generate and store one test off the async workers.
    async fn produce(&self, name: String) -> Result<PathBuf> {
        let generator = self.generator.clone();
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || {
            let test = generator.generate(&name)?;
            store.store(&test, &name)
        })
        .await?
    }
}
