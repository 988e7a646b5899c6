//! Destination storage.
//!
//! A [`Transport`] creates folders and uploads blobs into a hierarchical
//! store addressed by opaque container ids. Each request ends in exactly one
//! of: success, [`TransferError::Failed`], [`TransferError::Aborted`].

pub mod local;

pub use local::LocalStore;

use crate::error::TransferError;
use crate::session::ProgressSink;
use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

/// Folder created at the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFolder {
    /// Container id children are uploaded into
    pub id: String,
    pub name: String,
    pub link: String,
}

/// File uploaded to the destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    pub link: String,
    pub icon_link: Option<String>,
    /// Containers holding the file
    pub parents: Vec<String>,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Create a folder named `name` inside container `parent_id`
    async fn insert_folder(
        &self,
        name: &str,
        parent_id: &str,
        cancel: &CancellationToken,
    ) -> Result<RemoteFolder, TransferError>;

    /// Upload `blob` as file `name` inside container `parent_id`, reporting
    /// bytes sent through `progress`
    async fn insert_blob(
        &self,
        blob: Bytes,
        name: &str,
        parent_id: &str,
        progress: ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<RemoteFile, TransferError>;

    /// Make every in-flight and future request end with `Aborted`
    fn abort_all_requests(&self);
}
