//! ziplift: extract archives into hierarchical storage.
//!
//! The [`Session`] walks an [`EntryTree`] built from an archive, creates each
//! folder at the destination before scheduling its children, and decompresses
//! and uploads files through a bounded [`WorkQueue`]. Every entry moves
//! through an [`EntryState`] machine; failures stay local to their entry or
//! cascade to a failed folder's subtree, and a later `execute(true)` resumes
//! only what did not make it.
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use ziplift::{read_entry_tree, Collaborators, LocalStore, Session, SessionConfig, ZipArchiveSource};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let archive = Path::new("bundle.zip");
//! let tree = read_entry_tree(archive)?;
//! let collaborators = Collaborators::new(
//!     Arc::new(LocalStore::new("out")?),
//!     Arc::new(ZipArchiveSource::new(archive)),
//! );
//! let mut session = Session::new(tree, "", collaborators, SessionConfig::default());
//! session.execute(false).await?;
//! if session.has_errors() {
//!     session.execute(true).await?;
//! }
//! session.close()?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod cli;
pub mod config;
pub mod entry;
pub mod error;
pub mod observer;
pub mod progress;
pub mod queue;
pub mod session;
pub mod transport;
pub mod util;

pub use archive::{read_entry_tree, Decompressor, ZipArchiveSource};
pub use config::{Config, SessionConfig};
pub use entry::{ArchiveMember, Entry, EntryId, EntryKind, EntryState, EntryTree};
pub use error::{Error, ErrorKind, Result, SessionError, TransferError};
pub use observer::{NullObserver, SelectAll, Selection, SessionObserver};
pub use queue::{QueueEvent, WorkQueue};
pub use session::{AbortHandle, Collaborators, ExtractionOutcome, ProgressSink, Session};
pub use tokio_util::sync::CancellationToken;
pub use transport::{LocalStore, RemoteFile, RemoteFolder, Transport};
