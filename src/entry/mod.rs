//! Archive entries: the tree model and the per-entry state machine.

pub mod state;
pub mod tree;

pub use state::EntryState;
pub use tree::{
    ArchiveMember, Descendants, Entry, EntryId, EntryKind, EntryTree, RemoteObject,
    TransferProgress,
};
