//! The partitioned, position-ordered view that every surface renders from.
//!
//! An [`OrderedCollection`] maps container keys to the items in that
//! container, each partition kept sorted by ascending `position`. Every item
//! appears in exactly one partition. Partitions that become empty are
//! dropped, so two collections holding the same items compare equal no
//! matter which containers were visited in between.
//!
//! Mutation happens only inside the crate: the move resolver, the pipeline and
//! the reconciler all take a collection by reference and hand back the next
//! one by value.

use std::collections::{BTreeMap, HashSet, VecDeque};

use tracing::warn;

use crate::Result;
use crate::item::{ContainerKey, ItemId, OrderedItem, Payload, Record};
use crate::position;

pub mod errors;

pub use errors::CollectionError;

/// Items grouped by container key and sorted by position.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedCollection<K, P> {
    partitions: BTreeMap<K, Vec<OrderedItem<K, P>>>,
}

impl<K: ContainerKey, P: Payload> Default for OrderedCollection<K, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ContainerKey, P: Payload> OrderedCollection<K, P> {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self {
            partitions: BTreeMap::new(),
        }
    }

    /// Build a cold collection from authoritative records.
    ///
    /// Records may arrive in any order. Equal positions within a partition
    /// are kept in arrival order and logged, since correct allocation never
    /// produces them.
    pub fn from_records(records: impl IntoIterator<Item = Record<K, P>>) -> Result<Self> {
        Self::from_items(records.into_iter().map(OrderedItem::from))
    }

    /// Build a collection from items, keeping their optimistic flags.
    pub fn from_items(items: impl IntoIterator<Item = OrderedItem<K, P>>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut partitions: BTreeMap<K, Vec<OrderedItem<K, P>>> = BTreeMap::new();

        for item in items {
            if !item.position.is_finite() {
                return Err(CollectionError::InvalidPosition {
                    id: item.id.to_string(),
                    position: item.position,
                }
                .into());
            }
            if !seen.insert(item.id.clone()) {
                return Err(CollectionError::DuplicateItem {
                    id: item.id.to_string(),
                }
                .into());
            }
            partitions
                .entry(item.container.clone())
                .or_default()
                .push(item);
        }

        for (key, items) in partitions.iter_mut() {
            // Stable: ties keep arrival order
            items.sort_by(|a, b| a.position.total_cmp(&b.position));
            if items.windows(2).any(|w| w[0].position == w[1].position) {
                warn!(container = ?key, "Partition loaded with duplicate positions");
            }
        }

        Ok(Self { partitions })
    }

    /// Items of one container, in order. Empty for unknown containers.
    pub fn partition(&self, key: &K) -> &[OrderedItem<K, P>] {
        self.partitions.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All non-empty partitions in key order.
    pub fn partitions(&self) -> impl Iterator<Item = (&K, &[OrderedItem<K, P>])> {
        self.partitions.iter().map(|(k, v)| (k, v.as_slice()))
    }

    /// Keys of all non-empty partitions.
    pub fn containers(&self) -> impl Iterator<Item = &K> {
        self.partitions.keys()
    }

    /// Every item, partition by partition.
    pub fn iter(&self) -> impl Iterator<Item = &OrderedItem<K, P>> {
        self.partitions.values().flatten()
    }

    /// Total number of items.
    pub fn len(&self) -> usize {
        self.partitions.values().map(Vec::len).sum()
    }

    /// True if the collection holds no items.
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Look up an item by id.
    pub fn get(&self, id: &ItemId) -> Option<&OrderedItem<K, P>> {
        self.locate(id)
            .and_then(|(key, index)| self.partitions.get(key)?.get(index))
    }

    /// Container and index of an item.
    pub fn locate(&self, id: &ItemId) -> Option<(&K, usize)> {
        self.partitions.iter().find_map(|(key, items)| {
            items
                .iter()
                .position(|item| &item.id == id)
                .map(|index| (key, index))
        })
    }

    /// True if an item with this id is present.
    pub fn contains(&self, id: &ItemId) -> bool {
        self.locate(id).is_some()
    }

    /// Container an item currently belongs to.
    pub fn container_of(&self, id: &ItemId) -> Option<&K> {
        self.locate(id).map(|(key, _)| key)
    }

    /// Ids of all unconfirmed items.
    pub fn optimistic_ids(&self) -> Vec<ItemId> {
        self.iter()
            .filter(|item| item.optimistic)
            .map(|item| item.id.clone())
            .collect()
    }

    /// Ids of the items above `key` in a hierarchy, nearest first.
    ///
    /// For a flat key this is empty. The walk stops at the first parent that
    /// is missing from the collection, and is bounded by the collection size
    /// so a corrupt parent loop cannot hang it.
    pub fn ancestors(&self, key: &K) -> Vec<ItemId> {
        let mut chain = Vec::new();
        let mut cursor = key.parent_item();
        while let Some(parent) = cursor {
            if chain.contains(parent) || chain.len() > self.len() {
                break;
            }
            chain.push(parent.clone());
            cursor = self.container_of(parent).and_then(ContainerKey::parent_item);
        }
        chain
    }

    /// True if placing `id` under `destination` would make it its own ancestor.
    pub fn would_create_cycle(&self, id: &ItemId, destination: &K) -> bool {
        self.ancestors(destination).contains(id)
    }

    /// Ids of every item below `id` in a hierarchy, breadth first.
    pub fn descendants(&self, id: &ItemId) -> Vec<ItemId> {
        let mut result = Vec::new();
        let mut frontier = VecDeque::from([id.clone()]);
        while let Some(current) = frontier.pop_front() {
            for (key, items) in &self.partitions {
                if key.parent_item() == Some(&current) {
                    for child in items {
                        if !result.contains(&child.id) && &child.id != id {
                            result.push(child.id.clone());
                            frontier.push_back(child.id.clone());
                        }
                    }
                }
            }
        }
        result
    }

    /// A copy with one partition renumbered to `1..=n`.
    ///
    /// This is the batch repair for exhausted position density; nothing in
    /// the engine calls it implicitly.
    pub fn renormalized(&self, key: &K) -> Self {
        let mut next = self.clone();
        if let Some(items) = next.partitions.get_mut(key) {
            *items = position::renormalize(items);
        }
        next
    }

    /// Verify the structural invariants.
    ///
    /// Each item sits under its own container, positions are finite and
    /// strictly increasing within a partition, and ids are unique.
    pub fn check_invariants(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (key, items) in &self.partitions {
            let mut previous: Option<f64> = None;
            for item in items {
                if &item.container != key {
                    return Err(CollectionError::ContainerMismatch {
                        id: item.id.to_string(),
                    }
                    .into());
                }
                if !item.position.is_finite() {
                    return Err(CollectionError::InvalidPosition {
                        id: item.id.to_string(),
                        position: item.position,
                    }
                    .into());
                }
                if let Some(previous) = previous
                    && item.position <= previous
                {
                    return Err(CollectionError::OutOfOrder {
                        id: item.id.to_string(),
                        position: item.position,
                        previous,
                    }
                    .into());
                }
                if !seen.insert(&item.id) {
                    return Err(CollectionError::DuplicateItem {
                        id: item.id.to_string(),
                    }
                    .into());
                }
                previous = Some(item.position);
            }
        }
        Ok(())
    }

    pub(crate) fn get_mut(&mut self, id: &ItemId) -> Option<&mut OrderedItem<K, P>> {
        self.partitions
            .values_mut()
            .flat_map(|items| items.iter_mut())
            .find(|item| &item.id == id)
    }

    /// Remove an item, dropping its partition if it becomes empty.
    pub(crate) fn remove(&mut self, id: &ItemId) -> Option<OrderedItem<K, P>> {
        let (key, index) = self
            .locate(id)
            .map(|(key, index)| (key.clone(), index))?;
        let items = self.partitions.get_mut(&key)?;
        let item = items.remove(index);
        if items.is_empty() {
            self.partitions.remove(&key);
        }
        Some(item)
    }

    /// Insert at an explicit index of the item's container, clamped to the end.
    pub(crate) fn insert_at(&mut self, index: usize, item: OrderedItem<K, P>) {
        let items = self.partitions.entry(item.container.clone()).or_default();
        let index = index.min(items.len());
        items.insert(index, item);
    }

    /// Insert after every sibling whose position is not greater than the item's.
    ///
    /// Returns the index the item landed at. Siblings are never touched.
    pub(crate) fn insert_sorted(&mut self, item: OrderedItem<K, P>) -> usize {
        let items = self.partitions.entry(item.container.clone()).or_default();
        let index = items.partition_point(|sibling| sibling.position <= item.position);
        items.insert(index, item);
        index
    }
}
