//! Seams between the session and its caller.
//!
//! A [`SessionObserver`] receives every state transition, progress update and
//! the terminal outcome of a run. A [`Selection`] decides which entries are
//! extracted at all.

use crate::entry::{Entry, EntryState};

/// Notification sink for a running session.
///
/// Calls are made from the session's coordinating loop, one at a time, and
/// must not block. Entries are snapshots: the observer reads them, it never
/// changes them.
pub trait SessionObserver: Send + Sync {
    /// `entry` already carries `state`
    fn update_entry_state(&self, _entry: &Entry, _state: EntryState) {}

    /// Weighted progress of the whole session
    fn handle_session_progress(&self, _current: u64, _total: u64) {}

    /// A folder or file now exists at the destination
    fn update_ui_for_file_complete(&self, _entry: &Entry, _link: &str, _icon_link: Option<&str>) {}

    fn extraction_complete(&self) {}

    fn extraction_canceled(&self) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl SessionObserver for NullObserver {}

/// Predicate consulted once per entry during the queueing pass
pub trait Selection: Send + Sync {
    fn is_selected(&self, entry: &Entry) -> bool;
}

impl<F> Selection for F
where
    F: Fn(&Entry) -> bool + Send + Sync,
{
    fn is_selected(&self, entry: &Entry) -> bool {
        self(entry)
    }
}

/// Selects every entry
#[derive(Debug, Default, Clone, Copy)]
pub struct SelectAll;

impl Selection for SelectAll {
    fn is_selected(&self, _entry: &Entry) -> bool {
        true
    }
}
