//! Extraction session.
//!
//! A [`Session`] binds one [`EntryTree`] to one destination container and
//! drives every selected entry through decompression and upload:
//!
//! ```text
//! execute(retry)
//!   -> queueing pass: DEFAULT entries become QUEUED or SKIPPED
//!   -> weighted size of every uploadable entry
//!   -> root folder (or the root's children) scheduled on the work queue
//!   -> each created folder unblocks its own children
//!   -> outcome once no entry is left in a non-terminal state
//! ```
//!
//! `execute` can be called again with `retry = true` to resume entries that
//! ended in an uploadable state. `close` ends the session for good.

mod accounting;
mod index;
mod orchestrator;
mod work;

pub use work::ProgressSink;

use crate::archive::Decompressor;
use crate::config::SessionConfig;
use crate::entry::EntryTree;
use crate::error::SessionError;
use crate::observer::{NullObserver, SelectAll, Selection, SessionObserver};
use crate::transport::{RemoteFile, Transport};
use orchestrator::Orchestrator;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Complete,
    Canceled,
}

/// External capability providers used by a session
#[derive(Clone)]
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub decompressor: Arc<dyn Decompressor>,
    pub observer: Arc<dyn SessionObserver>,
    pub selection: Arc<dyn Selection>,
}

impl Collaborators {
    /// Select everything and observe nothing
    pub fn new(transport: Arc<dyn Transport>, decompressor: Arc<dyn Decompressor>) -> Self {
        Self {
            transport,
            decompressor,
            observer: Arc::new(NullObserver),
            selection: Arc::new(SelectAll),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_selection(mut self, selection: Arc<dyn Selection>) -> Self {
        self.selection = selection;
        self
    }
}

/// Aborts a session from outside its `execute` call (another task, a
/// signal handler, an observer callback)
#[derive(Debug, Clone)]
pub struct AbortHandle {
    token: CancellationToken,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }
}

pub struct Session {
    inner: Option<Orchestrator>,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(
        tree: EntryTree,
        destination_id: impl Into<String>,
        collaborators: Collaborators,
        config: SessionConfig,
    ) -> Self {
        let cancel = CancellationToken::new();
        Self {
            inner: Some(Orchestrator::new(
                tree,
                destination_id.into(),
                collaborators,
                config,
                cancel.clone(),
            )),
            cancel,
        }
    }

    fn live(&mut self, operation: &'static str) -> Result<&mut Orchestrator, SessionError> {
        self.inner
            .as_mut()
            .ok_or(SessionError::Closed { operation })
    }

    /// Run until no entry is left in a non-terminal state.
    ///
    /// Returns once the outcome has been reported to the observer.
    pub async fn execute(&mut self, retry: bool) -> Result<ExtractionOutcome, SessionError> {
        let inner = self.live("execute")?;
        Ok(inner.execute(retry).await)
    }

    /// Cancel everything that is not in flight. Calling it again is a no-op.
    pub fn abort(&mut self) -> Result<(), SessionError> {
        self.live("abort")?.abort();
        Ok(())
    }

    /// Release the tree and collaborators. Shared collaborators are left
    /// untouched; stopping requests is `abort`'s job.
    pub fn close(&mut self) -> Result<(), SessionError> {
        match self.inner.take() {
            Some(_) => Ok(()),
            None => Err(SessionError::AlreadyClosed),
        }
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            token: self.cancel.clone(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.as_ref().is_some_and(|o| o.is_aborted)
    }

    pub fn has_been_retried(&self) -> bool {
        self.inner.as_ref().is_some_and(|o| o.has_been_retried)
    }

    /// `None` once closed
    pub fn tree(&self) -> Option<&EntryTree> {
        self.inner.as_ref().map(|o| &o.tree)
    }

    /// Weighted size of the current run
    pub fn total_size(&self) -> u64 {
        self.inner.as_ref().map_or(0, |o| o.accounting.total())
    }

    /// Weighted progress of the current run
    pub fn progress(&self) -> u64 {
        self.inner.as_ref().map_or(0, |o| o.accounting.current())
    }

    /// Some entry failed to decompress or upload
    pub fn has_errors(&self) -> bool {
        self.inner.as_ref().is_some_and(|o| o.has_errors())
    }

    /// Some entry failed for lack of authorization
    pub fn has_auth_errors(&self) -> bool {
        self.inner.as_ref().is_some_and(|o| o.has_auth_errors())
    }

    pub fn destination_id(&self) -> Option<&str> {
        self.inner.as_ref().map(|o| o.destination_id.as_str())
    }

    pub fn set_destination_id(&mut self, id: impl Into<String>) -> Result<(), SessionError> {
        self.live("update")?.destination_id = id.into();
        Ok(())
    }

    /// Upload next to an existing file: its first parent becomes the
    /// destination. Files without parents leave the destination unchanged.
    pub fn update_destination_from_file(&mut self, file: &RemoteFile) -> Result<(), SessionError> {
        let inner = self.live("update")?;
        if let Some(parent) = file.parents.first() {
            inner.destination_id = parent.clone();
        }
        Ok(())
    }
}
