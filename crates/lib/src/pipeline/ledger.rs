//! Bookkeeping for in-flight mutations.

use std::collections::VecDeque;
use std::fmt;

use super::MutationKind;
use crate::constants::LEDGER_HISTORY_LIMIT;
use crate::item::ItemId;

/// Identifies one run of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationId(u64);

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Lifecycle of a mutation once it passed prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationState {
    /// Visible locally, remote call outstanding
    Applied,
    Confirmed,
    RolledBack,
}

/// One entry of the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord<K> {
    pub id: MutationId,
    pub kind: MutationKind,
    /// The item as it was known when the mutation started
    pub item: ItemId,
    /// Every id the mutation's rollback would restore
    pub owned: Vec<ItemId>,
    /// Containers the prediction changed
    pub containers: Vec<K>,
    pub state: MutationState,
    /// Milliseconds since the epoch
    pub started_at: u64,
    pub settled_at: Option<u64>,
}

impl<K> MutationRecord<K> {
    pub fn is_pending(&self) -> bool {
        self.state == MutationState::Applied
    }

    /// True if this mutation would restore `id` on rollback.
    pub fn owns(&self, id: &ItemId) -> bool {
        self.owned.contains(id)
    }
}

/// Pending mutations plus a bounded history of settled ones.
#[derive(Debug)]
pub(crate) struct Ledger<K> {
    next: u64,
    records: VecDeque<MutationRecord<K>>,
}

impl<K> Default for Ledger<K> {
    fn default() -> Self {
        Self {
            next: 1,
            records: VecDeque::new(),
        }
    }
}

impl<K: Clone> Ledger<K> {
    pub(crate) fn begin(
        &mut self,
        kind: MutationKind,
        item: ItemId,
        owned: Vec<ItemId>,
        containers: Vec<K>,
        now: u64,
    ) -> MutationId {
        let id = MutationId(self.next);
        self.next += 1;
        self.records.push_back(MutationRecord {
            id,
            kind,
            item,
            owned,
            containers,
            state: MutationState::Applied,
            started_at: now,
            settled_at: None,
        });
        id
    }

    pub(crate) fn settle(&mut self, id: MutationId, state: MutationState, now: u64) {
        if let Some(record) = self.records.iter_mut().find(|r| r.id == id) {
            record.state = state;
            record.settled_at = Some(now);
        }
        self.trim();
    }

    pub(crate) fn pending(&self) -> Vec<MutationRecord<K>> {
        self.records
            .iter()
            .filter(|r| r.is_pending())
            .cloned()
            .collect()
    }

    pub(crate) fn history(&self) -> Vec<MutationRecord<K>> {
        self.records.iter().cloned().collect()
    }

    // Drop the oldest settled records beyond the limit; pending ones stay
    fn trim(&mut self) {
        let mut settled = self.records.iter().filter(|r| !r.is_pending()).count();
        while settled > LEDGER_HISTORY_LIMIT {
            let Some(index) = self.records.iter().position(|r| !r.is_pending()) else {
                break;
            };
            self.records.remove(index);
            settled -= 1;
        }
    }
}
