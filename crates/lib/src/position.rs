//! Fractional positions for ordered siblings.
//!
//! Items are ordered by a floating point `position`. Inserting between two
//! neighbours takes the midpoint, so an insertion never renumbers the rest of
//! the partition. The price is that repeated bisection of the same gap
//! eventually runs out of floating point precision; [`is_exhausted`] detects
//! that and [`renormalize`] repairs it. The engine never renormalizes on its
//! own: deciding when drift warrants a batch rewrite is up to the caller.

use crate::constants::{EMPTY_PARTITION_POSITION, HEAD_FLOOR, MIN_POSITION_GAP, TAIL_STEP};
use crate::item::OrderedItem;

/// Computes a position for an item inserted between `before` and `after`.
///
/// * both neighbours: the midpoint
/// * only a following neighbour (head insert): half of it, floored at [`HEAD_FLOOR`]
/// * only a preceding neighbour (tail insert): one past it
/// * no neighbours: [`EMPTY_PARTITION_POSITION`]
///
/// # Examples
///
/// ```
/// use orderly::position::allocate;
///
/// assert_eq!(allocate(Some(1.0), Some(2.0)), 1.5);
/// assert_eq!(allocate(None, Some(2.0)), 1.0);
/// assert_eq!(allocate(Some(5.0), None), 6.0);
/// assert_eq!(allocate(None, None), 1.0);
/// ```
pub fn allocate(before: Option<f64>, after: Option<f64>) -> f64 {
    match (before, after) {
        (Some(before), Some(after)) => (before + after) / 2.0,
        (None, Some(after)) => (after / 2.0).max(HEAD_FLOOR),
        (Some(before), None) => before + TAIL_STEP,
        (None, None) => EMPTY_PARTITION_POSITION,
    }
}

/// Allocates a position for insertion at `index` of `siblings`.
///
/// `siblings` must not contain the item being placed. `index` is clamped to
/// `0..=siblings.len()`.
pub fn allocate_at<K, P>(siblings: &[OrderedItem<K, P>], index: usize) -> f64 {
    let (before, after) = neighbours(siblings, index);
    allocate(before, after)
}

/// Positions of the items that would surround an insertion at `index`.
pub fn neighbours<K, P>(siblings: &[OrderedItem<K, P>], index: usize) -> (Option<f64>, Option<f64>) {
    let index = index.min(siblings.len());
    let before = index
        .checked_sub(1)
        .and_then(|i| siblings.get(i))
        .map(|item| item.position);
    let after = siblings.get(index).map(|item| item.position);
    (before, after)
}

/// Whether `position` no longer fits strictly between its neighbours.
///
/// True when floating point bisection has collapsed onto a neighbour, or the
/// remaining gap is below [`MIN_POSITION_GAP`]. The head floor can also
/// produce this: with a head item at or below `2 * HEAD_FLOOR` the floored
/// value is not smaller than its successor.
pub fn is_exhausted(before: Option<f64>, position: f64, after: Option<f64>) -> bool {
    if !position.is_finite() {
        return true;
    }
    let below = before.is_some_and(|b| position - b < MIN_POSITION_GAP);
    let above = after.is_some_and(|a| a - position < MIN_POSITION_GAP);
    below || above
}

/// Reassigns consecutive integer positions `1..=n` in the current order.
pub fn renormalize<K: Clone, P: Clone>(items: &[OrderedItem<K, P>]) -> Vec<OrderedItem<K, P>> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| OrderedItem {
            position: (index + 1) as f64,
            ..item.clone()
        })
        .collect()
}

/// Smallest gap between consecutive positions, or `None` for fewer than two items.
///
/// Callers can use this to decide when a partition is worth renormalizing.
pub fn min_gap<K, P>(items: &[OrderedItem<K, P>]) -> Option<f64> {
    items
        .windows(2)
        .map(|pair| pair[1].position - pair[0].position)
        .reduce(f64::min)
}
