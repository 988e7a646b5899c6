//! Entry state machine.
//!
//! ```text
//! DEFAULT -> QUEUED | SKIPPED -> PENDING
//!   directory: BEGIN_UPLOAD -> UPLOAD_COMPLETE | UPLOAD_ERROR | UPLOAD_ABORTED
//!   file:      BEGIN_DECOMPRESSION -> DECOMPRESSION_PROGRESS* -> DECOMPRESSION_COMPLETE
//!              -> BEGIN_UPLOAD -> UPLOAD_PROGRESS* -> UPLOAD_ALL_BYTES_TRANSFERRED
//!              -> UPLOAD_COMPLETE | UPLOAD_ERROR | UPLOAD_ABORTED
//! any non-terminal -> QUEUED_PENDING_RETRY (ancestor folder failed)
//! any non-terminal, not in flight -> CANCELED (abort, ancestor folder aborted)
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum EntryState {
    #[default]
    Default,
    Queued,
    Skipped,
    Pending,
    QueuedPendingRetry,
    Canceled,
    BeginDecompression,
    DecompressionProgress,
    DecompressionComplete,
    DecompressionError,
    BeginUpload,
    UploadProgress,
    UploadAllBytesTransferred,
    UploadComplete,
    UploadError,
    UploadAborted,
}

impl EntryState {
    /// No further work happens for the entry during the current run.
    ///
    /// `QueuedPendingRetry` is terminal for this run but uploadable on the next.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EntryState::UploadComplete
                | EntryState::UploadError
                | EntryState::Skipped
                | EntryState::Canceled
                | EntryState::QueuedPendingRetry
                | EntryState::UploadAborted
        )
    }

    /// Eligible to be scheduled by a queueing pass
    pub fn is_uploadable(self) -> bool {
        matches!(
            self,
            EntryState::Queued | EntryState::QueuedPendingRetry | EntryState::UploadError
        )
    }

    pub fn is_error(self) -> bool {
        matches!(
            self,
            EntryState::UploadError | EntryState::DecompressionError
        )
    }

    /// A request is on the wire. Abort must let these finish on their own.
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            EntryState::BeginUpload
                | EntryState::UploadProgress
                | EntryState::UploadAllBytesTransferred
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryState::Default => "default",
            EntryState::Queued => "queued",
            EntryState::Skipped => "skipped",
            EntryState::Pending => "pending",
            EntryState::QueuedPendingRetry => "queuedPendingRetry",
            EntryState::Canceled => "canceled",
            EntryState::BeginDecompression => "beginDecompression",
            EntryState::DecompressionProgress => "decompressionProgress",
            EntryState::DecompressionComplete => "decompressionComplete",
            EntryState::DecompressionError => "decompressionError",
            EntryState::BeginUpload => "beginUpload",
            EntryState::UploadProgress => "uploadProgress",
            EntryState::UploadAllBytesTransferred => "uploadAllBytesTransferred",
            EntryState::UploadComplete => "uploadComplete",
            EntryState::UploadError => "uploadError",
            EntryState::UploadAborted => "uploadAborted",
        }
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
