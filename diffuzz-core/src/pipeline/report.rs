//! Divergence reporting
//!
//! The report is a single-slot channel. The first divergence published wins
//! the slot; later ones found before shutdown completes are logged and
//! dropped. Publishing never waits, so a worker cannot block on a report
//! nobody is reading yet.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::warn;

use crate::comparator::Mismatch;

/// Why two engines were judged to disagree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DivergenceCause {
    Mismatch(Mismatch),
    /// The outputs could not be read back for comparison
    Unreadable { error: String },
}

impl fmt::Display for DivergenceCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DivergenceCause::Mismatch(mismatch) => write!(f, "{}", mismatch),
            DivergenceCause::Unreadable { error } => write!(f, "unreadable output: {}", error),
        }
    }
}

/// A test case whose outputs differed between two engines
#[derive(Debug, Clone)]
pub struct Divergence {
    /// Preserved test artifact
    pub artifact: PathBuf,
    pub left_engine: String,
    pub right_engine: String,
    pub cause: DivergenceCause,
    /// Buffer files still holding each engine's raw output
    pub outputs: Vec<PathBuf>,
    pub worker: usize,
    pub detected_at: DateTime<Utc>,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vs {} on {}: {}",
            self.left_engine,
            self.right_engine,
            self.artifact.display(),
            self.cause
        )
    }
}

/// Publishing half of the divergence report, one clone per execution worker
#[derive(Debug, Clone)]
pub struct DivergenceReporter {
    sender: mpsc::Sender<Divergence>,
}

/// Create the single-slot divergence report
pub fn divergence_report() -> (DivergenceReporter, mpsc::Receiver<Divergence>) {
    let (sender, receiver) = mpsc::channel(1);
    (DivergenceReporter { sender }, receiver)
}

impl DivergenceReporter {
    /// Publish without waiting. Returns false when the slot was already taken
    /// or nobody listens any more.
    pub fn publish(&self, divergence: Divergence) -> bool {
        match self.sender.try_send(divergence) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(divergence)) => {
                warn!(
                    artifact = %divergence.artifact.display(),
                    "Divergence report already taken, dropping additional divergence"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(divergence)) => {
                warn!(
                    artifact = %divergence.artifact.display(),
                    "Divergence report closed, dropping divergence"
                );
                false
            }
        }
    }
}
