//! Per-object transfer execution
//!
//! A worker runs exactly one task to completion or failure and knows nothing
//! about its siblings. Every backend error is folded into a `Failed` outcome;
//! nothing escapes `execute`.

use crate::error::{MirrorError, Result};
use crate::plan::{SkipReason, TransferTask};
use crate::storage::{BackendSet, StorageBackend, TransferMode};
use std::sync::Arc;
use tracing::{debug, warn};

/// Final status of one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferStatus {
    /// Object was copied to the destination
    Succeeded,
    /// Object needed no copy (planner-level decision)
    Skipped(SkipReason),
    /// Copy failed; detail is human-readable
    Failed(String),
}

/// One task's result, produced by a worker and consumed by the reporter
#[derive(Debug, Clone)]
pub struct TransferOutcome {
    /// Scenario label the task belonged to
    pub scenario: String,
    /// Object key
    pub key: String,
    /// Bytes moved (zero unless the copy succeeded)
    pub bytes: u64,
    /// Terminal status
    pub status: TransferStatus,
}

impl TransferOutcome {
    /// Outcome for a successfully copied object
    pub fn succeeded(task: &TransferTask, bytes: u64) -> Self {
        Self {
            scenario: task.scenario.to_string(),
            key: task.key.clone(),
            bytes,
            status: TransferStatus::Succeeded,
        }
    }

    /// Outcome for a failed copy
    pub fn failed(task: &TransferTask, detail: impl Into<String>) -> Self {
        Self {
            scenario: task.scenario.to_string(),
            key: task.key.clone(),
            bytes: 0,
            status: TransferStatus::Failed(detail.into()),
        }
    }
}

/// The seam between the pool and the actual copy work; tests substitute a
/// mock implementation.
pub trait TransferExecutor: Send + Sync {
    /// Run one task to a terminal outcome. Must not panic for any
    /// backend-reported error.
    fn execute(&self, task: &TransferTask) -> TransferOutcome;
}

/// Real executor copying between the run's opened backends
pub struct BackendExecutor {
    backends: BackendSet,
}

impl BackendExecutor {
    /// Build an executor over the run's opened backends
    pub fn new(backends: BackendSet) -> Self {
        Self { backends }
    }

    fn copy(&self, task: &TransferTask) -> Result<u64> {
        let source = self.backends.get(task.scenario.source)?;
        let dest = self.backends.get(task.scenario.dest)?;

        match source.transfer_mode() {
            TransferMode::Streaming => self.copy_streaming(task, &source, &dest),
            TransferMode::Staging => self.copy_staged(task, &source, &dest),
        }
    }

    /// Pipe bytes end to end without touching local disk
    fn copy_streaming(
        &self,
        task: &TransferTask,
        source: &Arc<dyn StorageBackend>,
        dest: &Arc<dyn StorageBackend>,
    ) -> Result<u64> {
        let mut object = source.fetch_stream(&task.scenario.source_container, &task.key)?;
        if object.content_type.is_none() {
            object.content_type = Some("application/octet-stream".to_string());
        }
        dest.put_from_stream(&task.scenario.dest_container, &task.key, object)
    }

    /// Materialize the object locally, upload, then always remove the
    /// staging file so failed uploads cannot exhaust the disk.
    fn copy_staged(
        &self,
        task: &TransferTask,
        source: &Arc<dyn StorageBackend>,
        dest: &Arc<dyn StorageBackend>,
    ) -> Result<u64> {
        if let Some(parent) = task.staging_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| MirrorError::staging(parent.to_path_buf(), e))?;
        }

        let staged = source
            .stage_to_local(&task.scenario.source_container, &task.key, &task.staging_path)
            .and_then(|_| {
                dest.put_from_local(&task.scenario.dest_container, &task.key, &task.staging_path)
            });

        if let Err(e) = std::fs::remove_file(&task.staging_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %task.staging_path.display(), error = %e,
                      "could not remove staging file");
            }
        }

        staged
    }
}

impl TransferExecutor for BackendExecutor {
    fn execute(&self, task: &TransferTask) -> TransferOutcome {
        debug!(scenario = %task.scenario, key = %task.key, "copying");
        match self.copy(task) {
            Ok(bytes) => TransferOutcome::succeeded(task, bytes),
            Err(e) => {
                warn!(scenario = %task.scenario, key = %task.key, error = %e, "copy failed");
                TransferOutcome::failed(task, e.to_string())
            }
        }
    }
}
