//! Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use ziplift::error::DecompressError;
use ziplift::{
    AbortHandle, ArchiveMember, Collaborators, Decompressor, Entry, EntryState, EntryTree,
    ProgressSink, RemoteFile, RemoteFolder, Selection, Session, SessionConfig, SessionObserver,
    TransferError, Transport,
};

pub const DESTINATION: &str = "dest-root";

pub fn member(compressed: u64, uncompressed: u64) -> ArchiveMember {
    ArchiveMember {
        index: 0,
        compressed_size: compressed,
        uncompressed_size: uncompressed,
        crc32: 0,
    }
}

// =============================================================================
// Decompressor
// =============================================================================

/// Produces zero-filled payloads of the member's size
#[derive(Default)]
pub struct MockDecompressor {
    failing: Mutex<HashSet<String>>,
}

impl MockDecompressor {
    pub fn fail(&self, path: &str) {
        self.failing.lock().unwrap().insert(path.to_string());
    }

    pub fn heal(&self, path: &str) {
        self.failing.lock().unwrap().remove(path);
    }
}

#[async_trait]
impl Decompressor for MockDecompressor {
    async fn extract(
        &self,
        path: &str,
        member: &ArchiveMember,
        progress: ProgressSink,
        _verify_checksum: bool,
    ) -> Result<Bytes, DecompressError> {
        let total = member.compressed_size;
        progress.report(0, total);
        tokio::task::yield_now().await;

        if self.failing.lock().unwrap().contains(path) {
            return Err(DecompressError::ChecksumMismatch {
                path: path.to_string(),
                expected: member.crc32,
                actual: !member.crc32,
            });
        }

        progress.report(total / 2, total);
        progress.report(total, total);
        Ok(Bytes::from(vec![0u8; member.uncompressed_size as usize]))
    }
}

// =============================================================================
// Transport
// =============================================================================

/// In-memory store that records every request
pub struct MockTransport {
    next_id: AtomicUsize,
    chunks: u64,
    honors_abort: bool,
    aborted: AtomicBool,
    /// "folder:<name>@<parent>" / "blob:<name>@<parent>", in completion order
    pub log: Mutex<Vec<String>>,
    folder_failures: Mutex<HashMap<String, VecDeque<TransferError>>>,
    blob_failures: Mutex<HashMap<String, VecDeque<TransferError>>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            next_id: AtomicUsize::new(1),
            chunks: 4,
            honors_abort: true,
            aborted: AtomicBool::new(false),
            log: Mutex::new(Vec::new()),
            folder_failures: Mutex::new(HashMap::new()),
            blob_failures: Mutex::new(HashMap::new()),
        }
    }
}

impl MockTransport {
    /// Requests already started run to completion even after an abort
    pub fn ignoring_abort(mut self) -> Self {
        self.honors_abort = false;
        self
    }

    /// Next `insert_folder` for `name` fails with `err`
    pub fn fail_folder(&self, name: &str, err: TransferError) {
        self.folder_failures
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .push_back(err);
    }

    /// Next `insert_blob` for `name` fails with `err`
    pub fn fail_blob(&self, name: &str, err: TransferError) {
        self.blob_failures
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .push_back(err);
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn folders(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter(|l| l.starts_with("folder:"))
            .collect()
    }

    pub fn blobs(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter(|l| l.starts_with("blob:"))
            .collect()
    }

    pub fn was_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    fn stopped(&self, cancel: &CancellationToken) -> bool {
        self.honors_abort && (cancel.is_cancelled() || self.aborted.load(Ordering::SeqCst))
    }

    fn id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn take_failure(
        failures: &Mutex<HashMap<String, VecDeque<TransferError>>>,
        name: &str,
    ) -> Option<TransferError> {
        failures
            .lock()
            .unwrap()
            .get_mut(name)
            .and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn insert_folder(
        &self,
        name: &str,
        parent_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RemoteFolder, TransferError> {
        tokio::task::yield_now().await;
        if self.stopped(cancel) {
            return Err(TransferError::aborted("aborted"));
        }
        if let Some(err) = Self::take_failure(&self.folder_failures, name) {
            return Err(err);
        }

        let id = self.id("folder");
        self.log
            .lock()
            .unwrap()
            .push(format!("folder:{}@{}", name, parent_id));
        Ok(RemoteFolder {
            link: format!("https://store.test/{}", id),
            id,
            name: name.to_string(),
        })
    }

    async fn insert_blob(
        &self,
        blob: Bytes,
        name: &str,
        parent_id: &str,
        progress: ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<RemoteFile, TransferError> {
        if self.stopped(cancel) {
            return Err(TransferError::aborted("aborted"));
        }
        if let Some(err) = Self::take_failure(&self.blob_failures, name) {
            return Err(err);
        }

        let total = blob.len() as u64;
        progress.report(0, total);
        for chunk in 1..=self.chunks {
            tokio::task::yield_now().await;
            if self.stopped(cancel) {
                return Err(TransferError::aborted("aborted"));
            }
            progress.report(total * chunk / self.chunks, total);
        }

        let id = self.id("file");
        self.log
            .lock()
            .unwrap()
            .push(format!("blob:{}@{}", name, parent_id));
        Ok(RemoteFile {
            link: format!("https://store.test/{}", id),
            icon_link: Some("https://store.test/icon".to_string()),
            id,
            name: name.to_string(),
            parents: vec![parent_id.to_string()],
        })
    }

    fn abort_all_requests(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }
}

// =============================================================================
// Observer
// =============================================================================

#[derive(Default)]
pub struct RecordingObserver {
    pub transitions: Mutex<Vec<(String, EntryState)>>,
    pub progress: Mutex<Vec<(u64, u64)>>,
    pub links: Mutex<Vec<(String, String, Option<String>)>>,
    pub complete: AtomicUsize,
    pub canceled: AtomicUsize,
    abort_on: Mutex<Option<(EntryState, AbortHandle)>>,
}

impl RecordingObserver {
    /// Abort the session the first time any entry enters `state`
    pub fn abort_on(&self, state: EntryState, handle: AbortHandle) {
        *self.abort_on.lock().unwrap() = Some((state, handle));
    }

    pub fn states_of(&self, path: &str) -> Vec<EntryState> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, s)| *s)
            .collect()
    }

    pub fn progress(&self) -> Vec<(u64, u64)> {
        self.progress.lock().unwrap().clone()
    }

    pub fn complete_count(&self) -> usize {
        self.complete.load(Ordering::SeqCst)
    }

    pub fn canceled_count(&self) -> usize {
        self.canceled.load(Ordering::SeqCst)
    }
}

impl SessionObserver for RecordingObserver {
    fn update_entry_state(&self, entry: &Entry, state: EntryState) {
        self.transitions
            .lock()
            .unwrap()
            .push((entry.path().to_string(), state));
        if let Some((trigger, handle)) = self.abort_on.lock().unwrap().as_ref() {
            if *trigger == state {
                handle.abort();
            }
        }
    }

    fn handle_session_progress(&self, current: u64, total: u64) {
        self.progress.lock().unwrap().push((current, total));
    }

    fn update_ui_for_file_complete(&self, entry: &Entry, link: &str, icon_link: Option<&str>) {
        self.links.lock().unwrap().push((
            entry.path().to_string(),
            link.to_string(),
            icon_link.map(str::to_string),
        ));
    }

    fn extraction_complete(&self) {
        self.complete.fetch_add(1, Ordering::SeqCst);
    }

    fn extraction_canceled(&self) {
        self.canceled.fetch_add(1, Ordering::SeqCst);
    }
}

// =============================================================================
// Harness
// =============================================================================

pub struct Harness {
    pub session: Session,
    pub transport: Arc<MockTransport>,
    pub decompressor: Arc<MockDecompressor>,
    pub observer: Arc<RecordingObserver>,
}

impl Harness {
    pub fn new(tree: EntryTree, selection: Arc<dyn Selection>, workers: usize) -> Self {
        Self::with_transport(tree, selection, workers, MockTransport::default())
    }

    pub fn with_transport(
        tree: EntryTree,
        selection: Arc<dyn Selection>,
        workers: usize,
        transport: MockTransport,
    ) -> Self {
        let transport = Arc::new(transport);
        let decompressor = Arc::new(MockDecompressor::default());
        let observer = Arc::new(RecordingObserver::default());
        let collaborators = Collaborators::new(transport.clone(), decompressor.clone())
            .with_observer(observer.clone())
            .with_selection(selection);
        let config = SessionConfig {
            workers,
            ..SessionConfig::default()
        };
        Self {
            session: Session::new(tree, DESTINATION, collaborators, config),
            transport,
            decompressor,
            observer,
        }
    }

    pub fn state(&self, path: &str) -> EntryState {
        let tree = self.session.tree().unwrap();
        tree.get(tree.lookup(path).unwrap()).state()
    }

    pub fn entry(&self, path: &str) -> &Entry {
        let tree = self.session.tree().unwrap();
        tree.get(tree.lookup(path).unwrap())
    }
}

/// Every entry but the root, which is treated as already present
pub fn all_but_root() -> Arc<dyn Selection> {
    Arc::new(|entry: &Entry| !entry.path().is_empty())
}

pub fn select_all() -> Arc<dyn Selection> {
    Arc::new(ziplift::SelectAll)
}

pub fn assert_monotonic(progress: &[(u64, u64)]) {
    for pair in progress.windows(2) {
        assert!(
            pair[0].0 <= pair[1].0,
            "progress went backwards: {:?} -> {:?}",
            pair[0],
            pair[1]
        );
    }
}
