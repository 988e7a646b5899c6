//! Archive access: indexing a container into an [`EntryTree`] and extracting
//! single members.

pub mod zip;

pub use self::zip::{read_entry_tree, ZipArchiveSource};

use crate::entry::ArchiveMember;
use crate::error::DecompressError;
use crate::session::ProgressSink;
use async_trait::async_trait;
use bytes::Bytes;

/// Per-file payload extraction
#[async_trait]
pub trait Decompressor: Send + Sync {
    /// Decompress one member into memory.
    ///
    /// Progress is reported in compressed bytes read, so a finished member
    /// has reported exactly `member.compressed_size`.
    async fn extract(
        &self,
        path: &str,
        member: &ArchiveMember,
        progress: ProgressSink,
        verify_checksum: bool,
    ) -> Result<Bytes, DecompressError>;
}
