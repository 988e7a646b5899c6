//! Work items run by the session's queue.
//!
//! A work item reports phase changes and progress as [`WorkEvent`]s on an
//! unbounded channel and resolves to exactly one [`WorkOutcome`]. It never
//! touches the entry tree; the coordinating loop applies everything.

use crate::archive::Decompressor;
use crate::entry::{ArchiveMember, EntryId, EntryState};
use crate::error::{ErrorKind, TransferError};
use crate::transport::{RemoteFile, RemoteFolder, Transport};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Progress reporting
// =============================================================================

/// Cloneable `(current, total)` callback handed to collaborators
#[derive(Clone)]
pub struct ProgressSink {
    report: Arc<dyn Fn(u64, u64) + Send + Sync>,
}

impl ProgressSink {
    pub fn new<F>(report: F) -> Self
    where
        F: Fn(u64, u64) + Send + Sync + 'static,
    {
        Self {
            report: Arc::new(report),
        }
    }

    /// Sink that drops every report
    pub fn noop() -> Self {
        Self::new(|_, _| {})
    }

    pub fn report(&self, current: u64, total: u64) {
        (self.report)(current, total)
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSink").finish_non_exhaustive()
    }
}

// =============================================================================
// Work item -> session messages
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Decompression,
    Upload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkEvent {
    /// The item entered a new phase
    State { id: EntryId, state: EntryState },
    Progress {
        id: EntryId,
        phase: Phase,
        current: u64,
        total: u64,
    },
}

#[derive(Debug)]
pub enum WorkResult {
    FolderCreated(RemoteFolder),
    FileUploaded(RemoteFile),
    Failed { kind: ErrorKind, message: String },
    DecompressionFailed(String),
    /// The transport gave up on the request after an abort
    Aborted(String),
    /// The item noticed cancellation before committing to its next step
    Canceled,
}

#[derive(Debug)]
pub struct WorkOutcome {
    pub id: EntryId,
    pub result: WorkResult,
}

impl From<TransferError> for WorkResult {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::Failed { kind, message } => WorkResult::Failed { kind, message },
            TransferError::Aborted { message } => WorkResult::Aborted(message),
        }
    }
}

// =============================================================================
// Work items
// =============================================================================

/// Everything a work item needs, detached from the session
#[derive(Clone)]
pub struct WorkContext {
    pub transport: Arc<dyn Transport>,
    pub decompressor: Arc<dyn Decompressor>,
    pub events: mpsc::UnboundedSender<WorkEvent>,
    pub cancel: CancellationToken,
    pub verify_checksum: bool,
}

impl WorkContext {
    fn enter(&self, id: EntryId, state: EntryState) {
        // The receiver lives as long as the session; a send error only
        // means the session is gone and nobody cares any more.
        let _ = self.events.send(WorkEvent::State { id, state });
    }

    fn sink(&self, id: EntryId, phase: Phase) -> ProgressSink {
        let events = self.events.clone();
        ProgressSink::new(move |current, total| {
            let _ = events.send(WorkEvent::Progress {
                id,
                phase,
                current,
                total,
            });
        })
    }

    /// Create the folder for `id` inside `parent_id`
    pub async fn create_folder(self, id: EntryId, name: String, parent_id: String) -> WorkOutcome {
        if self.cancel.is_cancelled() {
            return WorkOutcome {
                id,
                result: WorkResult::Canceled,
            };
        }

        self.enter(id, EntryState::BeginUpload);
        let result = match self
            .transport
            .insert_folder(&name, &parent_id, &self.cancel)
            .await
        {
            Ok(folder) => WorkResult::FolderCreated(folder),
            Err(e) => e.into(),
        };
        WorkOutcome { id, result }
    }

    /// Decompress the file for `id` and upload it inside `parent_id`
    pub async fn upload_file(
        self,
        id: EntryId,
        path: String,
        name: String,
        member: ArchiveMember,
        parent_id: String,
    ) -> WorkOutcome {
        let canceled = WorkOutcome {
            id,
            result: WorkResult::Canceled,
        };
        if self.cancel.is_cancelled() {
            return canceled;
        }

        self.enter(id, EntryState::BeginDecompression);
        let sink = self.sink(id, Phase::Decompression);
        let extracted = tokio::select! {
            _ = self.cancel.cancelled() => return canceled,
            r = self.decompressor.extract(&path, &member, sink, self.verify_checksum) => r,
        };
        let blob = match extracted {
            Ok(blob) => blob,
            Err(e) => {
                return WorkOutcome {
                    id,
                    result: WorkResult::DecompressionFailed(e.to_string()),
                }
            }
        };
        self.enter(id, EntryState::DecompressionComplete);

        if self.cancel.is_cancelled() {
            return canceled;
        }

        self.enter(id, EntryState::BeginUpload);
        let sink = self.sink(id, Phase::Upload);
        let result = match self
            .transport
            .insert_blob(blob, &name, &parent_id, sink, &self.cancel)
            .await
        {
            Ok(file) => WorkResult::FileUploaded(file),
            Err(e) => e.into(),
        };
        WorkOutcome { id, result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_progress_sink_reports() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let inner = Arc::clone(&seen);
        let sink = ProgressSink::new(move |c, t| inner.lock().unwrap().push((c, t)));
        let copy = sink.clone();
        sink.report(1, 10);
        copy.report(10, 10);
        assert_eq!(*seen.lock().unwrap(), vec![(1, 10), (10, 10)]);
    }

    #[test]
    fn test_transfer_error_into_result() {
        let failed: WorkResult = TransferError::failed(ErrorKind::Auth, "denied").into();
        assert!(matches!(
            failed,
            WorkResult::Failed {
                kind: ErrorKind::Auth,
                ..
            }
        ));
        let aborted: WorkResult = TransferError::aborted("stop").into();
        assert!(matches!(aborted, WorkResult::Aborted(m) if m == "stop"));
    }
}
