//! Positioned items and the traits that parameterize them.
//!
//! An [`OrderedItem`] lives in exactly one partition of an
//! [`OrderedCollection`](crate::collection::OrderedCollection), named by its
//! container key. Two things vary between the surfaces that use the engine:
//!
//! * the container key ([`ContainerKey`]): a flat enumeration such as a board
//!   column, or a reference to another item such as a tree parent;
//! * the domain payload ([`Payload`]): opaque to the engine, it rides along
//!   with moves and is rewritten in place by updates.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

pub mod id;

pub use id::ItemId;

/// Key of the partition an item belongs to.
pub trait ContainerKey: Clone + Ord + Debug + Send + Sync + 'static {
    /// The item this container hangs off, for hierarchical containers.
    ///
    /// Returns `None` for flat keys (board columns) and for the root of a
    /// hierarchy. Keys that return `Some` are subject to cycle checks.
    fn parent_item(&self) -> Option<&ItemId> {
        None
    }
}

/// Tree containers: `None` is the root, `Some(id)` the children of `id`.
impl ContainerKey for Option<ItemId> {
    fn parent_item(&self) -> Option<&ItemId> {
        self.as_ref()
    }
}

/// Domain data carried by an item.
pub trait Payload: Clone + PartialEq + Debug + Send + Sync + 'static {
    /// A partial update of the payload.
    type Patch: Clone + PartialEq + Debug + Send + Sync + 'static;

    /// Overwrites the fields the patch carries.
    fn apply(&mut self, patch: &Self::Patch);

    /// Folds `newer` into `pending`; fields set in `newer` win.
    fn coalesce(pending: &mut Self::Patch, newer: Self::Patch);
}

/// An element of an ordered collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedItem<K, P> {
    pub id: ItemId,
    /// Partition the item currently belongs to
    pub container: K,
    /// Sort key within the partition; ascending
    pub position: f64,
    /// True while a remote write for this item is unconfirmed
    pub optimistic: bool,
    pub payload: P,
}

impl<K: ContainerKey, P: Payload> OrderedItem<K, P> {
    /// Creates a confirmed item.
    pub fn new(id: impl Into<ItemId>, container: K, position: f64, payload: P) -> Self {
        Self {
            id: id.into(),
            container,
            position,
            optimistic: false,
            payload,
        }
    }

    /// Creates an unconfirmed placeholder.
    pub fn placeholder(id: ItemId, container: K, position: f64, payload: P) -> Self {
        Self {
            id,
            container,
            position,
            optimistic: true,
            payload,
        }
    }
}

/// The authoritative shape of an item as returned by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<K, P> {
    pub id: ItemId,
    pub container: K,
    pub position: f64,
    pub payload: P,
}

impl<K, P> From<Record<K, P>> for OrderedItem<K, P> {
    fn from(record: Record<K, P>) -> Self {
        Self {
            id: record.id,
            container: record.container,
            position: record.position,
            optimistic: false,
            payload: record.payload,
        }
    }
}

impl<K: Clone, P: Clone> From<&OrderedItem<K, P>> for Record<K, P> {
    fn from(item: &OrderedItem<K, P>) -> Self {
        Self {
            id: item.id.clone(),
            container: item.container.clone(),
            position: item.position,
            payload: item.payload.clone(),
        }
    }
}

/// A partial update of an item: payload fields plus an optional container change.
///
/// `position` is filled in by the pipeline when a container change has been
/// resolved to a concrete slot, so the remote side stores the same order the
/// local view shows.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemPatch<K, P: Payload> {
    pub payload: P::Patch,
    pub container: Option<K>,
    pub position: Option<f64>,
}

impl<K: ContainerKey, P: Payload> ItemPatch<K, P> {
    /// A payload-only patch.
    pub fn payload(patch: P::Patch) -> Self {
        Self {
            payload: patch,
            container: None,
            position: None,
        }
    }

    /// Also move the item to `container`.
    pub fn with_container(mut self, container: K) -> Self {
        self.container = Some(container);
        self
    }

    /// Pin the position the item should be stored at.
    pub fn with_position(mut self, position: f64) -> Self {
        self.position = Some(position);
        self
    }

    /// True if the patch moves the item to another container.
    pub fn changes_container(&self) -> bool {
        self.container.is_some()
    }

    /// Folds a newer patch into this one.
    pub fn coalesce(&mut self, newer: Self) {
        P::coalesce(&mut self.payload, newer.payload);
        if newer.container.is_some() {
            self.container = newer.container;
        }
        if newer.position.is_some() {
            self.position = newer.position;
        }
    }
}
