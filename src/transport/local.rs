//! Directory-backed store.
//!
//! Container ids are paths relative to the store root, `/`-separated; the
//! root itself is `""`. Blobs are written in chunks so uploads report
//! progress and can be aborted between chunks.

use super::{RemoteFile, RemoteFolder, Transport};
use crate::error::{ErrorKind, TransferError};
use crate::session::ProgressSink;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Write chunk size for blob uploads
pub const UPLOAD_CHUNK_SIZE: usize = 64 * 1024; // 64KB

pub struct LocalStore {
    root: PathBuf,
    chunk_size: usize,
    aborted: CancellationToken,
}

impl LocalStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;
        Ok(Self {
            root: root.canonicalize()?,
            chunk_size: UPLOAD_CHUNK_SIZE,
            aborted: CancellationToken::new(),
        })
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of a container or file id
    pub fn resolve(&self, id: &str) -> Result<PathBuf, TransferError> {
        let mut path = self.root.clone();
        for component in id.split('/').filter(|c| !c.is_empty()) {
            if !is_plain_name(component) {
                return Err(TransferError::failed(
                    ErrorKind::NotFound,
                    format!("Invalid id '{}'", id),
                ));
            }
            path.push(component);
        }
        Ok(path)
    }

    fn check_aborted(&self, cancel: &CancellationToken) -> Result<(), TransferError> {
        if cancel.is_cancelled() || self.aborted.is_cancelled() {
            return Err(TransferError::aborted("Request aborted by user"));
        }
        Ok(())
    }

    async fn container(&self, parent_id: &str) -> Result<PathBuf, TransferError> {
        let dir = self.resolve(parent_id)?;
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => Ok(dir),
            Ok(_) => Err(TransferError::failed(
                ErrorKind::NotFound,
                format!("'{}' is not a folder", parent_id),
            )),
            Err(e) => Err(TransferError::failed(
                e.kind().into(),
                format!("Parent folder '{}': {}", parent_id, e),
            )),
        }
    }
}

#[async_trait]
impl Transport for LocalStore {
    async fn insert_folder(
        &self,
        name: &str,
        parent_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RemoteFolder, TransferError> {
        self.check_aborted(cancel)?;
        check_name(name)?;
        let path = self.container(parent_id).await?.join(name);

        match tokio::fs::create_dir(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => {
                debug!(path = %path.display(), "Folder already exists, reusing");
            }
            Err(e) => return Err(io_failure(&path, e)),
        }

        Ok(RemoteFolder {
            id: join_id(parent_id, name),
            name: name.to_string(),
            link: file_link(&path),
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
        self.check_aborted(cancel)?;
        check_name(name)?;
        let path = self.container(parent_id).await?.join(name);

        let total = blob.len() as u64;
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| io_failure(&path, e))?;

        let mut written = 0u64;
        progress.report(0, total);
        for chunk in blob.chunks(self.chunk_size) {
            if let Err(aborted) = self.check_aborted(cancel) {
                drop(file);
                let _ = tokio::fs::remove_file(&path).await;
                return Err(aborted);
            }
            file.write_all(chunk)
                .await
                .map_err(|e| io_failure(&path, e))?;
            written += chunk.len() as u64;
            progress.report(written, total);
        }
        file.flush().await.map_err(|e| io_failure(&path, e))?;

        Ok(RemoteFile {
            id: join_id(parent_id, name),
            name: name.to_string(),
            link: file_link(&path),
            icon_link: None,
            parents: vec![parent_id.to_string()],
        })
    }

    fn abort_all_requests(&self) {
        self.aborted.cancel();
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

fn check_name(name: &str) -> Result<(), TransferError> {
    if is_plain_name(name) {
        Ok(())
    } else {
        Err(TransferError::failed(
            ErrorKind::Other,
            format!("Invalid name '{}'", name),
        ))
    }
}

fn join_id(parent_id: &str, name: &str) -> String {
    if parent_id.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent_id.trim_end_matches('/'), name)
    }
}

fn file_link(path: &Path) -> String {
    format!("file://{}", path.display())
}

fn io_failure(path: &Path, err: std::io::Error) -> TransferError {
    TransferError::failed(err.kind().into(), format!("{}: {}", path.display(), err))
}
