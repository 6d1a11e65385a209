//! Pre-mutation baselines used for rollback.

use std::collections::BTreeMap;

use crate::collection::OrderedCollection;
use crate::item::{ContainerKey, ItemId, OrderedItem, Payload};

/// A copy of the partitions a mutation touches, taken just before it applied.
///
/// The snapshot *owns* the ids the mutation changed. Restoring it only puts
/// those ids back the way they were; every other item in the live view,
/// including other mutations' optimistic placeholders, is left alone. That
/// is what keeps concurrent rollbacks from erasing each other.
///
/// An owned item that has disappeared from the live view by the time of the
/// restore was removed by some other mutation and stays gone, unless the
/// snapshot was taken for a removal of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationSnapshot<K, P> {
    partitions: BTreeMap<K, Vec<OrderedItem<K, P>>>,
    owned: Vec<ItemId>,
    /// Set for deletes: owned items are brought back even though absent
    reinstate: bool,
}

impl<K: ContainerKey, P: Payload> MutationSnapshot<K, P> {
    /// Capture the partitions holding `owned`, plus `extra` containers.
    ///
    /// Owned ids that are not yet in the collection (a create's temporary id)
    /// are simply removed on restore.
    pub fn capture(
        collection: &OrderedCollection<K, P>,
        owned: Vec<ItemId>,
        extra: impl IntoIterator<Item = K>,
    ) -> Self {
        let mut keys: Vec<K> = owned
            .iter()
            .filter_map(|id| collection.container_of(id).cloned())
            .collect();
        keys.extend(extra);

        let partitions = keys
            .into_iter()
            .map(|key| {
                let items = collection.partition(&key).to_vec();
                (key, items)
            })
            .collect();

        Self {
            partitions,
            owned,
            reinstate: false,
        }
    }

    /// Like [`capture`](Self::capture), for a mutation that removes the
    /// owned items from the view.
    pub fn capture_removal(collection: &OrderedCollection<K, P>, owned: Vec<ItemId>) -> Self {
        Self {
            reinstate: true,
            ..Self::capture(collection, owned, std::iter::empty())
        }
    }

    /// Ids the snapshot restores.
    pub fn owned(&self) -> &[ItemId] {
        &self.owned
    }

    /// Containers captured, in key order.
    pub fn containers(&self) -> Vec<K> {
        self.partitions.keys().cloned().collect()
    }

    /// The captured copy of one partition.
    pub fn partition(&self, key: &K) -> &[OrderedItem<K, P>] {
        self.partitions.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Put the owned items of `current` back to their captured state.
    pub fn restore(&self, current: &OrderedCollection<K, P>) -> OrderedCollection<K, P> {
        let mut next = current.clone();
        for item in self.partitions.values().flatten() {
            if !self.owned.contains(&item.id) {
                continue;
            }
            if next.remove(&item.id).is_some() || self.reinstate {
                next.insert_sorted(item.clone());
            }
        }
        // Temporary ids of creates
        for id in &self.owned {
            if self.partitions.values().flatten().all(|item| &item.id != id) {
                next.remove(id);
            }
        }
        next
    }
}
