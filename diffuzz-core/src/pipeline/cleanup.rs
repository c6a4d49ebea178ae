//! Cleanup worker: delete artifacts that need no preservation

use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::state::RunState;
use crate::queue::WorkQueue;

/// Drain `queue` until it is closed, deleting each file. Deletion failures
/// are logged and skipped.
pub fn spawn_cleanup_worker(
    queue: Arc<WorkQueue<PathBuf>>,
    state: Arc<RunState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(path) = queue.recv().await {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    state.record_deletion();
                    debug!(artifact = %path.display(), "Removed test artifact");
                }
                Err(e) => {
                    warn!(artifact = %path.display(), error = %e, "Error deleting file");
                }
            }
        }
        info!(deleted = state.deleted(), "Cleanup worker stopped");
    })
}
