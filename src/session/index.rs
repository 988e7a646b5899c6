//! Derived views over entry states.

use crate::entry::{EntryId, EntryState};
use std::collections::{BTreeSet, HashMap};

/// Per-state membership plus the liveness set.
///
/// Both views change together in [`StateIndex::record`], which is the only
/// mutator.
#[derive(Debug, Default)]
pub struct StateIndex {
    by_state: HashMap<EntryState, BTreeSet<EntryId>>,
    in_process: BTreeSet<EntryId>,
}

impl StateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: EntryId, old: EntryState, new: EntryState) {
        if let Some(set) = self.by_state.get_mut(&old) {
            set.remove(&id);
        }
        self.by_state.entry(new).or_default().insert(id);

        if new.is_terminal() {
            self.in_process.remove(&id);
        } else {
            self.in_process.insert(id);
        }
    }

    /// No entry is left in a non-terminal state
    pub fn is_idle(&self) -> bool {
        self.in_process.is_empty()
    }

    pub fn in_process(&self) -> impl Iterator<Item = EntryId> + '_ {
        self.in_process.iter().copied()
    }

    pub fn live_count(&self) -> usize {
        self.in_process.len()
    }

    pub fn count(&self, state: EntryState) -> usize {
        self.by_state.get(&state).map_or(0, BTreeSet::len)
    }
}
