//! The coordinating loop.
//!
//! Owns the entry tree, the work queue and the derived indices. Work items
//! run concurrently inside the queue, but every mutation of session state
//! happens here, one event at a time.

use super::accounting::Accounting;
use super::index::StateIndex;
use super::work::{Phase, WorkContext, WorkEvent, WorkOutcome, WorkResult};
use super::{Collaborators, ExtractionOutcome};
use crate::config::SessionConfig;
use crate::entry::{EntryId, EntryKind, EntryState, EntryTree, RemoteObject};
use crate::error::ErrorKind;
use crate::queue::{QueueEvent, WorkQueue};
use crate::transport::RemoteFolder;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub(crate) struct Orchestrator {
    pub(crate) tree: EntryTree,
    pub(crate) destination_id: String,
    pub(crate) has_been_retried: bool,
    pub(crate) is_aborted: bool,

    collaborators: Collaborators,
    config: SessionConfig,
    queue: WorkQueue<WorkOutcome>,
    index: StateIndex,
    pub(crate) accounting: Accounting,
    cancel: CancellationToken,
    events_tx: mpsc::UnboundedSender<WorkEvent>,
    events_rx: mpsc::UnboundedReceiver<WorkEvent>,

    /// Retry flag of the run in progress
    retry_run: bool,
    outcome: Option<ExtractionOutcome>,
}

impl Orchestrator {
    pub(crate) fn new(
        tree: EntryTree,
        destination_id: String,
        collaborators: Collaborators,
        config: SessionConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            tree,
            destination_id,
            has_been_retried: false,
            is_aborted: false,
            queue: WorkQueue::new(config.workers),
            index: StateIndex::new(),
            accounting: Accounting::new(config.transfer_multiplier, config.entry_overhead),
            collaborators,
            config,
            cancel,
            events_tx,
            events_rx,
            retry_run: false,
            outcome: None,
        }
    }

    // =========================================================================
    // Run
    // =========================================================================

    pub(crate) async fn execute(&mut self, retry: bool) -> ExtractionOutcome {
        if retry {
            self.has_been_retried = true;
        }
        self.retry_run = retry;
        self.outcome = None;
        self.queue.clear();
        while self.events_rx.try_recv().is_ok() {}

        self.queue_entries();

        let uploadable: Vec<EntryId> = self
            .tree
            .walk()
            .filter(|&id| self.tree.get(id).state.is_uploadable())
            .collect();
        self.accounting
            .begin_run(uploadable.iter().map(|&id| self.tree.get(id)));
        info!(
            entries = uploadable.len(),
            total = self.accounting.total(),
            retry,
            "Starting extraction"
        );
        self.notify_progress();

        if self.is_aborted {
            self.cancel_remaining();
        } else {
            let root = self.tree.root();
            if self.tree.get(root).state.is_uploadable() {
                let destination = self.destination_id.clone();
                self.schedule(root, destination);
                self.queue.run();
            } else {
                let destination = match self.tree.get(root).folder() {
                    Some(folder) if self.tree.get(root).state == EntryState::UploadComplete => {
                        folder.id.clone()
                    }
                    _ => self.destination_id.clone(),
                };
                self.process_children(root, destination);
            }
        }

        self.check_complete();
        self.drive().await
    }

    /// Mark every untouched entry queued or skipped
    fn queue_entries(&mut self) {
        let fresh: Vec<EntryId> = self
            .tree
            .walk()
            .filter(|&id| self.tree.get(id).state == EntryState::Default)
            .collect();
        for id in fresh {
            let state = if self.collaborators.selection.is_selected(self.tree.get(id)) {
                EntryState::Queued
            } else {
                EntryState::Skipped
            };
            self.transition(id, state);
        }
    }

    async fn drive(&mut self) -> ExtractionOutcome {
        let cancel = self.cancel.clone();
        loop {
            if let Some(outcome) = self.outcome {
                if self.is_aborted {
                    self.queue.clear();
                }
                return outcome;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled(), if !self.is_aborted => self.abort(),
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                event = self.queue.next() => match event {
                    QueueEvent::Completed(outcome) => {
                        self.flush_events();
                        self.handle_outcome(outcome);
                    }
                    QueueEvent::Drained => {
                        self.flush_events();
                        self.resolve_unreachable();
                        self.check_complete();
                    }
                },
            }
        }
    }

    fn flush_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }
    }

    // =========================================================================
    // Scheduling
    // =========================================================================

    fn context(&self) -> WorkContext {
        WorkContext {
            transport: self.collaborators.transport.clone(),
            decompressor: self.collaborators.decompressor.clone(),
            events: self.events_tx.clone(),
            cancel: self.cancel.clone(),
            verify_checksum: self.config.verify_checksum,
        }
    }

    /// Enqueue the work item of an uploadable entry
    fn schedule(&mut self, id: EntryId, destination: String) {
        let ctx = self.context();
        let entry = self.tree.get_mut(id);
        entry.destination_id = Some(destination.clone());
        entry.upload_error = None;
        entry.message = None;
        entry.decompression.reset();
        entry.upload.reset();

        let name = entry.name().to_string();
        match entry.kind() {
            EntryKind::Directory { .. } => {
                self.queue.enqueue(ctx.create_folder(id, name, destination));
            }
            EntryKind::File(member) => {
                let member = *member;
                let path = entry.path().to_string();
                self.queue
                    .enqueue(ctx.upload_file(id, path, name, member, destination));
            }
        }
        self.transition(id, EntryState::Pending);
    }

    /// Schedule the children of `node` into container `destination`.
    ///
    /// Only one level is scheduled; a folder's children follow once the
    /// folder exists. On retry, folders that already exist are descended
    /// into directly.
    fn process_children(&mut self, node: EntryId, destination: String) {
        let children = self.tree.children(node).to_vec();

        if self.is_aborted {
            for child in children {
                if !self.tree.get(child).state.is_terminal() {
                    self.transition(child, EntryState::Canceled);
                }
            }
            return;
        }

        for child in children {
            let entry = self.tree.get(child);
            if entry.state.is_uploadable() {
                self.schedule(child, destination.clone());
            } else if self.retry_run && entry.state == EntryState::UploadComplete {
                if let Some(folder) = entry.folder() {
                    let existing = folder.id.clone();
                    self.process_children(child, existing);
                }
            }
        }
        self.queue.run();
    }

    // =========================================================================
    // State transitions
    // =========================================================================

    /// The one place entry states change.
    ///
    /// Indices first, then accounting, then the observer.
    fn transition(&mut self, id: EntryId, state: EntryState) {
        let entry = self.tree.get_mut(id);
        let old = entry.state;
        entry.state = state;
        self.index.record(id, old, state);

        if old != state {
            debug!(path = %entry.path(), from = %old, to = %state, "Entry state");
        }
        if state.is_terminal() && self.accounting.settle(id) > 0 {
            self.notify_progress();
        }
        self.collaborators
            .observer
            .update_entry_state(self.tree.get(id), state);
    }

    fn notify_progress(&self) {
        if self.is_aborted {
            return;
        }
        self.collaborators
            .observer
            .handle_session_progress(self.accounting.current(), self.accounting.total());
    }

    fn handle_event(&mut self, event: WorkEvent) {
        if self.is_aborted {
            return;
        }
        match event {
            WorkEvent::State { id, state } => {
                if self.tree.get(id).state.is_terminal() {
                    return;
                }
                self.transition(id, state);
            }
            WorkEvent::Progress {
                id,
                phase,
                current,
                total,
            } => {
                if self.tree.get(id).state.is_terminal() {
                    return;
                }
                self.handle_progress(id, phase, current, total);
            }
        }
    }

    fn handle_progress(&mut self, id: EntryId, phase: Phase, current: u64, total: u64) {
        let step = match phase {
            Phase::Decompression => self
                .tree
                .get_mut(id)
                .decompression
                .advance(current, total),
            Phase::Upload => {
                let entry = self.tree.get_mut(id);
                let previous = entry.upload.current;
                entry.upload.advance(current, total);
                self.accounting
                    .upload_step(self.tree.get(id), previous, current, total)
            }
        };

        if self.accounting.credit(id, step) > 0 {
            self.notify_progress();
        }

        match phase {
            Phase::Decompression => self.transition(id, EntryState::DecompressionProgress),
            Phase::Upload => {
                self.transition(id, EntryState::UploadProgress);
                if current == total {
                    self.transition(id, EntryState::UploadAllBytesTransferred);
                }
            }
        }
    }

    fn handle_outcome(&mut self, outcome: WorkOutcome) {
        let WorkOutcome { id, result } = outcome;
        if self.tree.get(id).state.is_terminal() {
            debug!(path = %self.tree.get(id).path(), "Ignoring outcome of a finished entry");
            return;
        }

        match result {
            WorkResult::FolderCreated(folder) => self.folder_created(id, folder),
            WorkResult::FileUploaded(file) => {
                let link = file.link.clone();
                let icon = file.icon_link.clone();
                self.tree.get_mut(id).remote = Some(RemoteObject::File(file));
                self.transition(id, EntryState::UploadComplete);
                self.collaborators.observer.update_ui_for_file_complete(
                    self.tree.get(id),
                    &link,
                    icon.as_deref(),
                );
            }
            WorkResult::Failed { kind, message } => self.upload_failed(id, kind, message),
            WorkResult::DecompressionFailed(message) => {
                warn!(path = %self.tree.get(id).path(), %message, "Decompression failed");
                self.tree.get_mut(id).message = Some(message.clone());
                self.transition(id, EntryState::DecompressionError);
                self.upload_failed(id, ErrorKind::Decompression, message);
            }
            WorkResult::Aborted(message) => {
                self.tree.get_mut(id).message = Some(message);
                self.transition(id, EntryState::UploadAborted);
                if self.tree.get(id).is_directory() {
                    self.cascade(id, |_| true, EntryState::Canceled);
                }
            }
            WorkResult::Canceled => self.transition(id, EntryState::Canceled),
        }

        self.check_complete();
    }

    fn folder_created(&mut self, id: EntryId, folder: RemoteFolder) {
        info!(path = %self.tree.get(id).path(), folder = %folder.id, "Folder created");
        let link = folder.link.clone();
        let container = folder.id.clone();
        self.tree.get_mut(id).remote = Some(RemoteObject::Folder(folder));
        self.transition(id, EntryState::UploadComplete);
        self.collaborators
            .observer
            .update_ui_for_file_complete(self.tree.get(id), &link, None);
        self.process_children(id, container);
    }

    fn upload_failed(&mut self, id: EntryId, kind: ErrorKind, message: String) {
        warn!(path = %self.tree.get(id).path(), %kind, %message, "Upload failed");
        let entry = self.tree.get_mut(id);
        entry.upload_error = Some(kind);
        entry.message = Some(message);
        self.transition(id, EntryState::UploadError);

        if self.tree.get(id).is_directory() {
            self.cascade(
                id,
                |state| state != EntryState::Skipped,
                EntryState::QueuedPendingRetry,
            );
        }
    }

    /// Move every descendant of `id` accepted by `filter` to `state`
    fn cascade(&mut self, id: EntryId, filter: impl Fn(EntryState) -> bool, state: EntryState) {
        let descendants: Vec<EntryId> = self.tree.descendants(id).collect();
        for child in descendants {
            if filter(self.tree.get(child).state) {
                self.transition(child, state);
            }
        }
    }

    // =========================================================================
    // Abort & completion
    // =========================================================================

    /// Stop the run: nothing new starts, in-flight requests are aborted and
    /// everything not already on the wire is canceled.
    pub(crate) fn abort(&mut self) {
        if self.is_aborted {
            return;
        }
        // Apply what work items already reported, so an item that went on the
        // wire is seen in progress and left to finish
        self.flush_events();
        info!(live = self.index.live_count(), "Aborting extraction");
        self.is_aborted = true;
        self.outcome = None;
        self.cancel.cancel();
        self.queue.stop();
        self.collaborators.transport.abort_all_requests();
        self.cancel_remaining();
        self.check_complete();
    }

    fn cancel_remaining(&mut self) {
        let ids: Vec<EntryId> = self.tree.walk().collect();
        for id in ids {
            let state = self.tree.get(id).state;
            if !state.is_terminal() && !state.is_in_progress() {
                self.transition(id, EntryState::Canceled);
            }
        }
    }

    /// Entries still live once the queue is idle sit below a folder that was
    /// not uploaded this run.
    fn resolve_unreachable(&mut self) {
        let orphans: Vec<EntryId> = self.index.in_process().collect();
        for id in orphans {
            warn!(path = %self.tree.get(id).path(), "Parent folder was not uploaded, skipping");
            self.tree.get_mut(id).message = Some("Parent folder was not uploaded".to_string());
            self.transition(id, EntryState::Skipped);
        }
    }

    /// Report the run's outcome once nothing is live any more
    fn check_complete(&mut self) {
        if !self.index.is_idle() || self.outcome.is_some() {
            return;
        }
        if self.accounting.settle_all() > 0 {
            self.notify_progress();
        }

        let outcome = if self.is_aborted {
            self.collaborators.observer.extraction_canceled();
            ExtractionOutcome::Canceled
        } else {
            self.collaborators.observer.extraction_complete();
            ExtractionOutcome::Complete
        };
        info!(
            ?outcome,
            uploaded = self.index.count(EntryState::UploadComplete),
            failed = self.index.count(EntryState::UploadError),
            progress = self.accounting.current(),
            total = self.accounting.total(),
            "Extraction finished"
        );
        self.outcome = Some(outcome);
    }

    pub(crate) fn has_errors(&self) -> bool {
        self.tree.entries().any(|e| e.state.is_error())
    }

    pub(crate) fn has_auth_errors(&self) -> bool {
        self.tree.entries().any(|e| e.has_auth_error())
    }
}
