//! The differential fuzzing pipeline
//!
//! ```text
//! generator pool --pending-tests--> execution pool --cleanup--> cleanup worker
//!                                         |
//!                                         +--divergence report--> coordinator
//! ```
//!
//! [`Pipeline::run`] spawns every pool, hands control to the
//! [`ShutdownCoordinator`] and returns a [`RunSummary`] once all tasks have
//! exited.

pub mod cleanup;
pub mod coordinator;
pub mod execution;
pub mod generation;
pub mod progress;
pub mod report;
pub mod state;

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{info, warn};

pub use cleanup::spawn_cleanup_worker;
pub use coordinator::{RunOutcome, RunPhase, RunTasks, ShutdownCoordinator};
pub use execution::{ExecutionPool, Verdict};
pub use generation::GeneratorPool;
pub use progress::{CounterFile, ProgressReporter, ProgressSnapshot};
pub use report::{divergence_report, Divergence, DivergenceCause, DivergenceReporter};
pub use state::RunState;

use crate::config::FuzzConfig;
use crate::engine::{Engine, TestGenerator};
use crate::queue::WorkQueue;
use crate::store::TestStore;
use crate::{Error, Result};

/// What a finished run reports back
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    /// Tests executed by every engine and compared
    pub executed: u64,
    /// Artifacts removed by the cleanup worker
    pub deleted: u64,
    /// Queued artifacts removed after the run stopped
    pub abandoned: usize,
    pub elapsed: Duration,
}

pub struct Pipeline<G: TestGenerator> {
    config: FuzzConfig,
    generator: Arc<G>,
    engines: Vec<Arc<dyn Engine>>,
}

impl<G: TestGenerator> Pipeline<G> {
    pub fn new(config: FuzzConfig, generator: G, engines: Vec<Arc<dyn Engine>>) -> Result<Self> {
        config.validate()?;
        validate_engines(&engines)?;
        Ok(Self {
            config,
            generator: Arc::new(generator),
            engines,
        })
    }

    pub fn config(&self) -> &FuzzConfig {
        &self.config
    }

    /// Run until `interrupt` resolves, a divergence is found, or the test
    /// budget is used up.
    pub async fn run<S>(self, interrupt: S) -> Result<RunSummary>
    where
        S: Future<Output = ()>,
    {
        let config = self.config;
        tokio::fs::create_dir_all(&config.output_dir).await?;
        tokio::fs::create_dir_all(&config.scratch_dir).await?;

        let started = Instant::now();
        let state = Arc::new(RunState::new(config.max_tests));
        let pending = Arc::new(WorkQueue::new("pending-tests", config.queue_capacity));
        let cleanup = Arc::new(WorkQueue::new("cleanup", config.cleanup_capacity));
        let (reporter, mut divergences) = divergence_report();
        let (reporter_shutdown, shutdown_rx) = watch::channel(false);

        info!(
            generators = config.generator_workers(),
            executors = config.execution_workers(),
            engines = ?self.engines.iter().map(|e| e.name()).collect::<Vec<_>>(),
            output_dir = %config.output_dir.display(),
            "Starting fuzzing run"
        );

        let mut workers = GeneratorPool::new(
            self.generator,
            TestStore::new(&config.output_dir),
            config.label.clone(),
            config.generator_workers(),
        )
        .spawn(pending.clone(), state.clone());

        workers.extend(
            ExecutionPool::new(
                self.engines,
                &config.scratch_dir,
                config.topology,
                config.execution_workers(),
            )
            .spawn(pending.clone(), cleanup.clone(), reporter, state.clone()),
        );

        let background = vec![
            spawn_cleanup_worker(cleanup, state.clone()),
            ProgressReporter::new(
                state.clone(),
                CounterFile::new(&config.counter_file),
                config.report_interval,
            )
            .spawn(shutdown_rx),
        ];

        let mut coordinator = ShutdownCoordinator::new(state.clone(), reporter_shutdown);
        let outcome = coordinator
            .run(interrupt, &mut divergences, RunTasks { workers, background })
            .await;

        let abandoned = remove_abandoned(&pending).await;

        Ok(RunSummary {
            outcome,
            executed: state.executed(),
            deleted: state.deleted(),
            abandoned,
            elapsed: started.elapsed(),
        })
    }
}

fn validate_engines(engines: &[Arc<dyn Engine>]) -> Result<()> {
    if engines.len() < 2 {
        return Err(Error::configuration(format!(
            "at least two engines are required, got {}",
            engines.len()
        )));
    }
    let mut names = HashSet::new();
    for engine in engines {
        let name = engine.name();
        if name.trim().is_empty() || name.contains(['/', '\\']) {
            return Err(Error::configuration(format!(
                "invalid engine name '{}'",
                name
            )));
        }
        if !names.insert(name) {
            return Err(Error::configuration(format!(
                "duplicate engine name '{}'",
                name
            )));
        }
    }
    Ok(())
}

/// Remove artifacts still queued when execution stopped.
async fn remove_abandoned(pending: &WorkQueue<PathBuf>) -> usize {
    let mut removed = 0;
    for path in pending.drain() {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(artifact = %path.display(), error = %e, "Failed to remove queued test"),
        }
    }
    if removed > 0 {
        info!(removed, "Removed tests left in the pending queue");
    }
    removed
}
