//! Shutdown coordinator
//!
//! Owns the decision to stop a run. While `Running` it waits for the first
//! of three events: an operator interrupt, a divergence report, or the
//! execution pool running dry. Whichever arrives first drives the single
//! transition to `Draining`, which raises the abort flag and cancels the
//! progress reporter. The run is `Stopped` once every spawned task has
//! returned.
//!
//! A pool running dry is a normal end only when the test budget was fully
//! handed out. Without a budget, or with tests left in it, the workers gave
//! up on their own and the run reports [`RunOutcome::Exhausted`].

use futures::future::join_all;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::report::Divergence;
use super::state::RunState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Running,
    Draining,
    Stopped,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Running => "running",
            RunPhase::Draining => "draining",
            RunPhase::Stopped => "stopped",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run ended
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Operator interrupt with no divergence found
    Interrupted,
    /// The test budget was exhausted and every test compared equal
    Completed,
    /// Every worker stopped on its own before the budget was used up,
    /// e.g. because tests could no longer be generated or stored
    Exhausted,
    /// Two engines disagreed; the artifact was preserved
    Diverged(Box<Divergence>),
}

impl RunOutcome {
    /// True for the outcomes an operator asked for: an interrupt or a
    /// fully used budget, with no divergence.
    pub fn is_clean(&self) -> bool {
        matches!(self, RunOutcome::Interrupted | RunOutcome::Completed)
    }

    pub fn divergence(&self) -> Option<&Divergence> {
        match self {
            RunOutcome::Diverged(divergence) => Some(divergence),
            _ => None,
        }
    }
}

/// Tasks the coordinator waits on while draining
pub struct RunTasks {
    pub workers: Vec<JoinHandle<()>>,
    pub background: Vec<JoinHandle<()>>,
}

pub struct ShutdownCoordinator {
    phase: RunPhase,
    state: Arc<RunState>,
    reporter_shutdown: watch::Sender<bool>,
}

impl ShutdownCoordinator {
    pub fn new(state: Arc<RunState>, reporter_shutdown: watch::Sender<bool>) -> Self {
        Self {
            phase: RunPhase::Running,
            state,
            reporter_shutdown,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Wait for a terminal event, drain every task and report the outcome.
    pub async fn run<S>(
        &mut self,
        interrupt: S,
        divergences: &mut mpsc::Receiver<Divergence>,
        tasks: RunTasks,
    ) -> RunOutcome
    where
        S: Future<Output = ()>,
    {
        let mut outcome = tokio::select! {
            _ = interrupt => {
                info!("Interrupt received");
                RunOutcome::Interrupted
            }
            found = divergences.recv() => match found {
                Some(divergence) => RunOutcome::Diverged(Box::new(divergence)),
                None if self.state.budget_exhausted() => {
                    info!("Execution pool finished, test budget used up");
                    RunOutcome::Completed
                }
                None => {
                    error!(
                        issued = self.state.issued(),
                        executed = self.state.executed(),
                        "Execution pool stopped before the run was asked to end"
                    );
                    RunOutcome::Exhausted
                }
            },
        };

        self.drain();
        self.wait(tasks).await;

        // A divergence may have been published while draining.
        if outcome.divergence().is_none() {
            if let Ok(divergence) = divergences.try_recv() {
                outcome = RunOutcome::Diverged(Box::new(divergence));
            }
        }
        if let Some(divergence) = outcome.divergence() {
            error!(
                artifact = %divergence.artifact.display(),
                left = %divergence.left_engine,
                right = %divergence.right_engine,
                cause = %divergence.cause,
                "Possible consensus error! File: {}",
                divergence.artifact.display()
            );
        }

        self.transition(RunPhase::Stopped);
        outcome
    }

    /// Enter `Draining`: stop new iterations and cancel the reporter.
    /// Has no effect outside `Running`.
    pub fn drain(&mut self) {
        if self.phase != RunPhase::Running {
            return;
        }
        self.transition(RunPhase::Draining);
        info!("Waiting for workers to exit");
        self.state.abort();
        // The reporter may already be gone; nothing else listens.
        let _ = self.reporter_shutdown.send(true);
    }

    async fn wait(&self, tasks: RunTasks) {
        let handles = tasks.workers.into_iter().chain(tasks.background);
        for result in join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Worker task failed");
            }
        }
    }

    fn transition(&mut self, next: RunPhase) {
        info!(from = %self.phase, to = %next, "Run phase change");
        self.phase = next;
    }
}
