//! Merging authoritative records into the optimistic view.
//!
//! [`reconcile`] swaps exactly one item (looked up by its optimistic or
//! current id) for the record the persistence layer returned. Siblings keep
//! whatever positions local moves gave them in the meantime.
//!
//! Views derived from a collection (a calendar grouped by due date, counters,
//! search indexes) subscribe through [`NotificationSink`] and are told which
//! containers changed. The engine does not know what depends on it.

use std::sync::Arc;

use tracing::{debug, error};

use crate::Result;
use crate::collection::OrderedCollection;
use crate::item::{ContainerKey, ItemId, OrderedItem, Payload, Record};
use crate::pipeline::MutationKind;

/// The result of reconciling one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation<K, P> {
    pub collection: OrderedCollection<K, P>,
    /// The confirmed item, or `None` if the looked-up id was no longer present
    pub item: Option<OrderedItem<K, P>>,
    /// Containers whose contents changed
    pub touched: Vec<K>,
}

/// Replace the item known as `lookup` with the authoritative `record`.
///
/// If the record keeps the item's container and position, the item is
/// replaced where it stands, so a tie the allocator produced at the head
/// floor keeps its optimistic order. Otherwise the item is removed and
/// reinserted into the record's container by the record's position, after
/// any sibling with an equal position. Its optimistic flag is cleared.
///
/// An id that is no longer in the collection (deleted locally while the write
/// was in flight) is not resurrected: the collection comes back unchanged.
pub fn reconcile<K: ContainerKey, P: Payload>(
    collection: &OrderedCollection<K, P>,
    lookup: &ItemId,
    record: Record<K, P>,
) -> Reconciliation<K, P> {
    let mut next = collection.clone();
    // A refresh may already have brought in the server copy
    if record.id != *lookup {
        next.remove(&record.id);
    }

    let index = next.locate(lookup).map(|(_, index)| index);
    let (Some(index), Some(previous)) = (index, next.remove(lookup)) else {
        debug!(%lookup, server_id = %record.id, "Confirmed item no longer in view, dropping");
        return Reconciliation {
            collection: collection.clone(),
            item: None,
            touched: Vec::new(),
        };
    };

    let item = OrderedItem::from(record);
    let mut touched = vec![previous.container.clone()];
    if !touched.contains(&item.container) {
        touched.push(item.container.clone());
    }
    if item.container == previous.container && item.position == previous.position {
        next.insert_at(index, item.clone());
    } else {
        next.insert_sorted(item.clone());
    }

    Reconciliation {
        collection: next,
        item: Some(item),
        touched,
    }
}

/// Why a [`ChangeEvent`] was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCause {
    /// The remote write succeeded and the view now holds the server's record.
    Confirmed(MutationKind),
    /// The remote write failed and the view was restored.
    RolledBack(MutationKind),
    /// A debounced edit was written.
    Saved,
}

/// Container-level change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent<K> {
    /// Containers whose contents changed
    pub containers: Vec<K>,
    /// The item the mutation was about, by its current id
    pub item: ItemId,
    /// The optimistic id the item was known by, for confirmed creates
    pub previous_id: Option<ItemId>,
    pub cause: ChangeCause,
}

impl<K: PartialEq> ChangeEvent<K> {
    /// True if `container` is among the changed containers.
    pub fn touches(&self, container: &K) -> bool {
        self.containers.contains(container)
    }
}

/// A read model that must be invalidated when the collection changes.
pub trait NotificationSink<K>: Send + Sync {
    /// Called after a mutation has settled.
    ///
    /// A failing sink is logged and does not affect the mutation or the
    /// other sinks.
    fn on_change(&self, event: &ChangeEvent<K>) -> Result<()>;
}

/// A set of sinks notified together.
pub struct SinkCollection<K> {
    sinks: Vec<Arc<dyn NotificationSink<K>>>,
}

impl<K> Default for SinkCollection<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> std::fmt::Debug for SinkCollection<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkCollection")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl<K> SinkCollection<K> {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Register a sink.
    pub fn add_sink(&mut self, sink: Arc<dyn NotificationSink<K>>) {
        self.sinks.push(sink);
    }

    /// Deliver `event` to every sink in registration order.
    ///
    /// Delivery continues past failing sinks; the first error is returned.
    pub fn notify(&self, event: &ChangeEvent<K>) -> Result<()> {
        let mut first_error = None;

        for sink in &self.sinks {
            if let Err(e) = sink.on_change(event) {
                error!(item = %event.item, "Notification sink failed: {e}");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}
