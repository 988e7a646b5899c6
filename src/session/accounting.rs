//! Weighted size and progress bookkeeping.
//!
//! Every uploadable entry of a run gets a weight:
//! `compressed + multiplier * uncompressed + overhead` for files, `overhead`
//! for folders. Progress reports credit fractions of that weight and a
//! terminal transition settles whatever is left, so an entry contributes its
//! weight exactly once per run whatever path it takes.

use crate::entry::{Entry, EntryId};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Credit {
    weight: u64,
    credited: u64,
}

#[derive(Debug)]
pub struct Accounting {
    multiplier: u64,
    overhead: u64,
    total: u64,
    current: u64,
    credits: HashMap<EntryId, Credit>,
}

impl Accounting {
    pub fn new(multiplier: u64, overhead: u64) -> Self {
        Self {
            multiplier,
            overhead,
            total: 0,
            current: 0,
            credits: HashMap::new(),
        }
    }

    pub fn weight(&self, entry: &Entry) -> u64 {
        let bytes = if entry.is_directory() {
            0
        } else {
            self.multiplier
                .saturating_mul(entry.uncompressed_size())
                .saturating_add(entry.compressed_size())
        };
        bytes.saturating_add(self.overhead)
    }

    /// Start a run over `entries`; progress restarts from zero
    pub fn begin_run<'a>(&mut self, entries: impl IntoIterator<Item = &'a Entry>) {
        self.credits.clear();
        self.current = 0;
        self.total = 0;
        for entry in entries {
            let weight = self.weight(entry);
            self.total = self.total.saturating_add(weight);
            self.credits.insert(
                entry.id(),
                Credit {
                    weight,
                    credited: 0,
                },
            );
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    /// Credit part of an entry's weight, never beyond it. Returns the amount
    /// actually applied.
    pub fn credit(&mut self, id: EntryId, amount: u64) -> u64 {
        let Some(credit) = self.credits.get_mut(&id) else {
            return 0;
        };
        let applied = amount.min(credit.weight - credit.credited);
        credit.credited += applied;
        self.current = self.current.saturating_add(applied);
        applied
    }

    /// Credit the rest of an entry's weight
    pub fn settle(&mut self, id: EntryId) -> u64 {
        self.credit(id, u64::MAX)
    }

    /// Settle every entry of the run
    pub fn settle_all(&mut self) -> u64 {
        let ids: Vec<EntryId> = self.credits.keys().copied().collect();
        ids.into_iter().map(|id| self.settle(id)).sum()
    }

    /// Normalized credit for an upload report moving from `previous` to
    /// `current` out of `total` bytes: the upload share of the weight is
    /// `multiplier * uncompressed`.
    pub fn upload_step(&self, entry: &Entry, previous: u64, current: u64, total: u64) -> u64 {
        if total == 0 {
            return 0;
        }
        let share = entry.uncompressed_size() as u128 * self.multiplier as u128;
        let at = |bytes: u64| share.saturating_mul(bytes.min(total) as u128) / total as u128;
        let step = at(current).saturating_sub(at(previous));
        u64::try_from(step).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{ArchiveMember, EntryTree};

    fn member(compressed: u64, uncompressed: u64) -> ArchiveMember {
        ArchiveMember {
            index: 0,
            compressed_size: compressed,
            uncompressed_size: uncompressed,
            crc32: 0,
        }
    }

    #[test]
    fn test_weights() {
        let mut tree = EntryTree::new("archive");
        let a = tree.add_file("docs/a.txt", member(100, 300)).unwrap();
        let docs = tree.lookup("docs").unwrap();
        let accounting = Accounting::new(3, 20000);

        assert_eq!(accounting.weight(tree.get(a)), 100 + 900 + 20000);
        assert_eq!(accounting.weight(tree.get(docs)), 20000);
    }

    #[test]
    fn test_oversized_members_saturate() {
        let mut tree = EntryTree::new("archive");
        let a = tree.add_file("a", member(u64::MAX, u64::MAX)).unwrap();
        let b = tree.add_file("b", member(1 << 62, 1 << 62)).unwrap();
        let mut accounting = Accounting::new(1_000, 20000);

        assert_eq!(accounting.weight(tree.get(a)), u64::MAX);
        accounting.begin_run([tree.get(a), tree.get(b)]);
        assert_eq!(accounting.total(), u64::MAX);

        let step = accounting.upload_step(tree.get(a), 0, u64::MAX, u64::MAX);
        assert_eq!(step, u64::MAX);
        accounting.settle_all();
        assert_eq!(accounting.current(), u64::MAX);
    }

    #[test]
    fn test_credit_is_capped_and_idempotent() {
        let mut tree = EntryTree::new("archive");
        let a = tree.add_file("a", member(10, 10)).unwrap();
        let mut accounting = Accounting::new(3, 100);
        accounting.begin_run([tree.get(a)]);
        assert_eq!(accounting.total(), 140);

        assert_eq!(accounting.credit(a, 100), 100);
        assert_eq!(accounting.credit(a, 100), 40);
        assert_eq!(accounting.settle(a), 0);
        assert_eq!(accounting.current(), 140);

        // Not part of the run
        let root = tree.root();
        assert_eq!(accounting.credit(root, 5), 0);
    }

    #[test]
    fn test_upload_steps_sum_to_share() {
        let mut tree = EntryTree::new("archive");
        let a = tree.add_file("a", member(7, 1000)).unwrap();
        let accounting = Accounting::new(3, 0);
        let entry = tree.get(a);

        let reports = [0u64, 333, 334, 999, 1000];
        let sum: u64 = reports
            .windows(2)
            .map(|w| accounting.upload_step(entry, w[0], w[1], 1000))
            .sum();
        assert_eq!(sum, 3000);
        assert_eq!(accounting.upload_step(entry, 0, 0, 0), 0);
    }
}
