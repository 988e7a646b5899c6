//! ZIP container support.
//!
//! Members are read raw (still compressed) so progress can follow the bytes
//! actually pulled from the archive; inflating happens in memory afterwards.

use super::Decompressor;
use crate::entry::{ArchiveMember, EntryTree};
use crate::error::{ArchiveError, DecompressError};
use crate::session::ProgressSink;
use crate::util::trim_file_extension;
use ::zip::{CompressionMethod, ZipArchive};
use async_trait::async_trait;
use bytes::Bytes;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Read size when pulling compressed bytes out of the archive
pub const READ_CHUNK_SIZE: usize = 64 * 1024; // 64KB

/// Build the entry tree of a ZIP archive from its central directory.
///
/// The root entry is named after the archive file without its extension.
pub fn read_entry_tree(path: &Path) -> Result<EntryTree, ArchiveError> {
    let mut archive = open(path)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut tree = EntryTree::new(trim_file_extension(&file_name));

    for index in 0..archive.len() {
        let file = archive.by_index_raw(index)?;
        let relative = file
            .enclosed_name()
            .and_then(|p| to_entry_path(&p))
            .ok_or_else(|| ArchiveError::InvalidPath(file.name().to_string()))?;

        if file.is_dir() {
            tree.add_directory(&relative)?;
        } else {
            tree.add_file(
                &relative,
                ArchiveMember {
                    index,
                    compressed_size: file.compressed_size(),
                    uncompressed_size: file.size(),
                    crc32: file.crc32(),
                },
            )?;
        }
    }

    debug!(archive = %path.display(), entries = tree.len(), "Indexed archive");
    Ok(tree)
}

fn open(path: &Path) -> Result<ZipArchive<BufReader<File>>, ArchiveError> {
    let file = File::open(path).map_err(|source| ArchiveError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ZipArchive::new(BufReader::new(file))?)
}

/// `/`-joined normal components, `None` when nothing is left
fn to_entry_path(path: &Path) -> Option<String> {
    let parts: Vec<String> = path
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        // A bare "./" directory entry maps onto the root
        return Some(String::new());
    }
    Some(parts.join("/"))
}

/// Extracts members of one ZIP file. Every call opens its own handle, so
/// concurrent extractions do not contend.
#[derive(Debug, Clone)]
pub struct ZipArchiveSource {
    path: PathBuf,
}

impl ZipArchiveSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Decompressor for ZipArchiveSource {
    async fn extract(
        &self,
        path: &str,
        member: &ArchiveMember,
        progress: ProgressSink,
        verify_checksum: bool,
    ) -> Result<Bytes, DecompressError> {
        let archive_path = self.path.clone();
        let entry_path = path.to_string();
        let member = *member;

        tokio::task::spawn_blocking(move || {
            extract_blocking(&archive_path, &entry_path, &member, &progress, verify_checksum)
        })
        .await
        .map_err(|e| DecompressError::Io(std::io::Error::other(e.to_string())))?
    }
}

fn extract_blocking(
    archive_path: &Path,
    path: &str,
    member: &ArchiveMember,
    progress: &ProgressSink,
    verify_checksum: bool,
) -> Result<Bytes, DecompressError> {
    let corrupt = |reason: String| DecompressError::Corrupt {
        path: path.to_string(),
        reason,
    };

    let file = File::open(archive_path)?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| corrupt(e.to_string()))?;
    let mut raw = archive
        .by_index_raw(member.index)
        .map_err(|e| corrupt(e.to_string()))?;
    let method = raw.compression();

    // Pull the compressed stream
    // Header sizes come from the archive; never allocate on their word alone
    let total = member.compressed_size;
    let mut compressed = Vec::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];
    let mut read = 0u64;
    progress.report(0, total);
    loop {
        let n = raw.read(&mut buf)?;
        if n == 0 {
            break;
        }
        compressed.extend_from_slice(&buf[..n]);
        read += n as u64;
        progress.report(read.min(total), total);
    }
    if read != total {
        return Err(corrupt(format!(
            "expected {} compressed bytes, read {}",
            total, read
        )));
    }

    let data = match method {
        CompressionMethod::Stored => compressed,
        CompressionMethod::Deflated => {
            // One byte past the declared size is enough to prove a mismatch
            let limit = member.uncompressed_size.saturating_add(1);
            let mut out = Vec::new();
            flate2::read::DeflateDecoder::new(compressed.as_slice())
                .take(limit)
                .read_to_end(&mut out)
                .map_err(|e| corrupt(e.to_string()))?;
            out
        }
        other => {
            return Err(DecompressError::Unsupported {
                path: path.to_string(),
                method: format!("{:?}", other),
            })
        }
    };

    let actual = data.len() as u64;
    if actual != member.uncompressed_size {
        return Err(DecompressError::SizeMismatch {
            path: path.to_string(),
            expected: member.uncompressed_size,
            actual,
        });
    }

    if verify_checksum {
        let actual = crc32fast::hash(&data);
        if actual != member.crc32 {
            return Err(DecompressError::ChecksumMismatch {
                path: path.to_string(),
                expected: member.crc32,
                actual,
            });
        }
    }

    Ok(Bytes::from(data))
}
