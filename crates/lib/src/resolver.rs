//! Move resolution for drag and drop.
//!
//! [`move_item`] takes the current collection, the id being dragged and the
//! place it was dropped, and computes the next collection plus the single
//! `(container, position)` pair that has to be persisted. Only the moved item
//! gets a new position; its siblings are never renumbered.
//!
//! Resolution is pure. Anything that cannot be resolved sensibly (the item is
//! gone, the drop lands where the item already is, the destination would make
//! a tree node its own ancestor) yields `None`, which callers treat as "do
//! nothing".

use tracing::trace;

use crate::collection::OrderedCollection;
use crate::item::{ContainerKey, ItemId, OrderedItem, Payload};
use crate::position;

/// Where a dragged item was dropped.
///
/// Decided once at the UI boundary so resolution never has to inspect ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget<K> {
    /// Dropped on a container itself: append at its end.
    ContainerEnd(K),

    /// Dropped on a sibling item: take the sibling's index.
    ///
    /// Within the item's own partition this is an array move (the item ends
    /// up at the sibling's former index). `container` is where the UI saw the
    /// sibling and is only used when the sibling has since disappeared, in
    /// which case the item is appended to that container instead.
    BeforeSibling { container: K, sibling: ItemId },

    /// Dropped between siblings at an explicit index.
    ///
    /// The index addresses the destination partition with the moving item
    /// already taken out, and is clamped to its length.
    Index { container: K, index: usize },
}

impl<K> DropTarget<K> {
    /// Append to the end of `container`.
    pub fn end_of(container: K) -> Self {
        DropTarget::ContainerEnd(container)
    }

    /// Drop onto `sibling`, last seen in `container`.
    pub fn on_sibling(container: K, sibling: impl Into<ItemId>) -> Self {
        DropTarget::BeforeSibling {
            container,
            sibling: sibling.into(),
        }
    }

    /// Insert at `index` of `container`.
    pub fn at(container: K, index: usize) -> Self {
        DropTarget::Index { container, index }
    }
}

/// The result of a successful move resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveOutcome<K, P> {
    /// The collection with the move applied
    pub collection: OrderedCollection<K, P>,
    /// The moved item with its new container and position
    pub moved: OrderedItem<K, P>,
    /// The container the item left
    pub from: K,
    /// Final index of the item in its destination partition
    pub index: usize,
    /// Set when the new position could not be placed strictly between its
    /// neighbours; the destination partition should be renormalized
    pub needs_renormalize: bool,
}

impl<K, P> MoveOutcome<K, P> {
    /// The container the item now belongs to.
    pub fn to(&self) -> &K {
        &self.moved.container
    }

    /// The new position to persist.
    pub fn position(&self) -> f64 {
        self.moved.position
    }
}

/// Resolve a drop into the next collection.
///
/// Returns `None` when the move is a no-op:
///
/// * the item is not in the collection (a drag racing a deletion);
/// * the item is dropped onto itself, or onto the index it already holds;
/// * a hierarchical destination is the item itself or one of its descendants;
/// * a hierarchical destination's parent item no longer exists.
///
/// # Examples
///
/// ```
/// use orderly::board::{Task, TaskStatus};
/// use orderly::collection::OrderedCollection;
/// use orderly::item::Record;
/// use orderly::resolver::{move_item, DropTarget};
///
/// let board = OrderedCollection::from_records(vec![
///     Record { id: "x".into(), container: TaskStatus::Todo, position: 1.0, payload: Task::new("X") },
///     Record { id: "y".into(), container: TaskStatus::Todo, position: 2.0, payload: Task::new("Y") },
/// ])
/// .unwrap();
///
/// let outcome = move_item(&board, &"y".into(), &DropTarget::on_sibling(TaskStatus::Todo, "x")).unwrap();
/// assert_eq!(outcome.position(), 0.5);
/// ```
pub fn move_item<K: ContainerKey, P: Payload>(
    collection: &OrderedCollection<K, P>,
    id: &ItemId,
    target: &DropTarget<K>,
) -> Option<MoveOutcome<K, P>> {
    let Some((from, from_index)) = collection
        .locate(id)
        .map(|(key, index)| (key.clone(), index))
    else {
        trace!(%id, "Move of unknown item ignored");
        return None;
    };

    let (destination, index) = resolve_destination(collection, id, &from, from_index, target)?;

    if destination == from && index == from_index {
        trace!(%id, "Move onto current index ignored");
        return None;
    }

    if let Some(parent) = destination.parent_item() {
        if collection.would_create_cycle(id, &destination) {
            trace!(%id, %parent, "Move rejected: destination is inside the moving subtree");
            return None;
        }
        if !collection.contains(parent) {
            trace!(%id, %parent, "Move rejected: destination parent no longer exists");
            return None;
        }
    }

    let mut next = collection.clone();
    let mut moved = next.remove(id)?;

    let siblings = next.partition(&destination);
    let index = index.min(siblings.len());
    let (before, after) = position::neighbours(siblings, index);
    let new_position = position::allocate(before, after);
    let needs_renormalize = position::is_exhausted(before, new_position, after);

    moved.container = destination;
    moved.position = new_position;
    next.insert_at(index, moved.clone());

    Some(MoveOutcome {
        collection: next,
        moved,
        from,
        index,
        needs_renormalize,
    })
}

/// Destination container and insertion index, measured without the moving item.
fn resolve_destination<K: ContainerKey, P: Payload>(
    collection: &OrderedCollection<K, P>,
    id: &ItemId,
    from: &K,
    from_index: usize,
    target: &DropTarget<K>,
) -> Option<(K, usize)> {
    let len_without = |key: &K| {
        let len = collection.partition(key).len();
        if key == from { len - 1 } else { len }
    };

    match target {
        DropTarget::ContainerEnd(container) => Some((container.clone(), len_without(container))),
        DropTarget::Index { container, index } => {
            Some((container.clone(), (*index).min(len_without(container))))
        }
        DropTarget::BeforeSibling { container, sibling } => {
            if sibling == id {
                trace!(%id, "Move onto itself ignored");
                return None;
            }
            match collection.locate(sibling) {
                // Array move: the item lands on the sibling's old index
                Some((key, sibling_index)) if key == from => {
                    if sibling_index == from_index {
                        return None;
                    }
                    Some((key.clone(), sibling_index))
                }
                Some((key, sibling_index)) => Some((key.clone(), sibling_index)),
                None => {
                    trace!(%id, %sibling, "Stale sibling target, appending to container");
                    Some((container.clone(), len_without(container)))
                }
            }
        }
    }
}
