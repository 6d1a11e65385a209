//! Synchronous prediction of a mutation's effect.

use tracing::trace;

use super::snapshot::MutationSnapshot;
use super::{Intent, Placement};
use crate::collection::OrderedCollection;
use crate::item::{ContainerKey, ItemId, ItemPatch, OrderedItem, Payload};
use crate::position;
use crate::resolver::{self, DropTarget};

/// The remote call that confirms a prediction.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall<K, P: Payload> {
    Create { container: K, payload: P },
    Update { id: ItemId, patch: ItemPatch<K, P> },
    Move { id: ItemId, container: K, position: f64 },
    Delete { id: ItemId },
}

/// A predicted next state together with what is needed to confirm or undo it.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction<K, P: Payload> {
    /// The collection to show immediately
    pub collection: OrderedCollection<K, P>,
    /// Baseline for rollback
    pub snapshot: MutationSnapshot<K, P>,
    /// Id of the affected item in `collection`; a temporary id for creates
    pub item: ItemId,
    /// What to send to the persistence collaborator
    pub remote: RemoteCall<K, P>,
    /// Set when the allocated position ran out of precision
    pub needs_renormalize: bool,
}

/// Compute the optimistic result of `intent` against `collection`.
///
/// Returns `None` when the intent resolves to nothing: an update or delete of
/// an id that is not in the view, a move the resolver rejects, or a create
/// under a tree parent that no longer exists. Optimistic ids are generated
/// as `"{id_prefix}-{uuid}"`.
pub fn predict<K: ContainerKey, P: Payload>(
    collection: &OrderedCollection<K, P>,
    intent: &Intent<K, P>,
    id_prefix: &str,
) -> Option<Prediction<K, P>> {
    match intent {
        Intent::Create {
            container,
            payload,
            placement,
        } => predict_create(collection, container, payload, *placement, id_prefix),
        Intent::Update { id, patch } => predict_update(collection, id, patch),
        Intent::Move { id, target } => predict_move(collection, id, target),
        Intent::Delete { id } => predict_delete(collection, id),
    }
}

fn predict_create<K: ContainerKey, P: Payload>(
    collection: &OrderedCollection<K, P>,
    container: &K,
    payload: &P,
    placement: Placement,
    id_prefix: &str,
) -> Option<Prediction<K, P>> {
    if let Some(parent) = container.parent_item()
        && !collection.contains(parent)
    {
        trace!(%parent, "Create under missing parent ignored");
        return None;
    }

    let id = ItemId::optimistic(id_prefix);
    let siblings = collection.partition(container);
    let index = match placement {
        Placement::Head => 0,
        Placement::Tail => siblings.len(),
    };
    let (before, after) = position::neighbours(siblings, index);
    let new_position = position::allocate(before, after);

    let snapshot =
        MutationSnapshot::capture(collection, vec![id.clone()], [container.clone()]);
    let mut next = collection.clone();
    next.insert_at(
        index,
        OrderedItem::placeholder(id.clone(), container.clone(), new_position, payload.clone()),
    );

    Some(Prediction {
        collection: next,
        snapshot,
        item: id,
        remote: RemoteCall::Create {
            container: container.clone(),
            payload: payload.clone(),
        },
        needs_renormalize: position::is_exhausted(before, new_position, after),
    })
}

fn predict_update<K: ContainerKey, P: Payload>(
    collection: &OrderedCollection<K, P>,
    id: &ItemId,
    patch: &ItemPatch<K, P>,
) -> Option<Prediction<K, P>> {
    let current = collection.container_of(id)?.clone();
    let snapshot = MutationSnapshot::capture(
        collection,
        vec![id.clone()],
        patch.container.iter().cloned(),
    );

    match &patch.container {
        Some(destination) if destination != &current => {
            // A container change lands at the head of the new container
            let outcome = resolver::move_item(collection, id, &DropTarget::at(destination.clone(), 0))?;
            let mut next = outcome.collection;
            let item = next.get_mut(id)?;
            item.payload.apply(&patch.payload);
            item.optimistic = true;

            let remote_patch = ItemPatch {
                payload: patch.payload.clone(),
                container: Some(destination.clone()),
                position: Some(outcome.moved.position),
            };
            Some(Prediction {
                collection: next,
                snapshot,
                item: id.clone(),
                remote: RemoteCall::Update {
                    id: id.clone(),
                    patch: remote_patch,
                },
                needs_renormalize: outcome.needs_renormalize,
            })
        }
        _ => {
            let mut next = collection.clone();
            let item = next.get_mut(id)?;
            item.payload.apply(&patch.payload);
            item.optimistic = true;

            Some(Prediction {
                collection: next,
                snapshot,
                item: id.clone(),
                remote: RemoteCall::Update {
                    id: id.clone(),
                    patch: ItemPatch::payload(patch.payload.clone()),
                },
                needs_renormalize: false,
            })
        }
    }
}

fn predict_move<K: ContainerKey, P: Payload>(
    collection: &OrderedCollection<K, P>,
    id: &ItemId,
    target: &DropTarget<K>,
) -> Option<Prediction<K, P>> {
    let outcome = resolver::move_item(collection, id, target)?;
    let snapshot =
        MutationSnapshot::capture(collection, vec![id.clone()], [outcome.to().clone()]);

    let mut next = outcome.collection;
    next.get_mut(id)?.optimistic = true;

    Some(Prediction {
        collection: next,
        snapshot,
        item: id.clone(),
        remote: RemoteCall::Move {
            id: id.clone(),
            container: outcome.moved.container,
            position: outcome.moved.position,
        },
        needs_renormalize: outcome.needs_renormalize,
    })
}

fn predict_delete<K: ContainerKey, P: Payload>(
    collection: &OrderedCollection<K, P>,
    id: &ItemId,
) -> Option<Prediction<K, P>> {
    if !collection.contains(id) {
        trace!(%id, "Delete of unknown item ignored");
        return None;
    }

    // Hide the whole subtree; only the root is sent
    let mut owned = vec![id.clone()];
    owned.extend(collection.descendants(id));
    let snapshot = MutationSnapshot::capture_removal(collection, owned.clone());

    let mut next = collection.clone();
    for hidden in &owned {
        next.remove(hidden);
    }

    Some(Prediction {
        collection: next,
        snapshot,
        item: id.clone(),
        remote: RemoteCall::Delete { id: id.clone() },
        needs_renormalize: false,
    })
}
