use orderly::{
    OrderedItem,
    board::{Task, TaskStatus},
    collection::OrderedCollection,
    constants::HEAD_FLOOR,
    position::{allocate, allocate_at, is_exhausted, min_gap, renormalize},
    resolver::{DropTarget, move_item},
};

use crate::helpers::*;

fn items(positions: &[f64]) -> Vec<OrderedItem<TaskStatus, Task>> {
    positions
        .iter()
        .enumerate()
        .map(|(i, &position)| OrderedItem::new(format!("t{i}"), TaskStatus::Todo, position, Task::new("t")))
        .collect()
}

#[test]
fn allocation_stays_strictly_between_neighbours() {
    let pairs = [(1.0, 2.0), (0.1, 0.2), (1.0, 1.0 + 1e-6), (100.0, 1000.0)];
    for (before, after) in pairs {
        let p = allocate(Some(before), Some(after));
        assert!(before < p && p < after, "{p} not in ({before}, {after})");
    }
}

#[test]
fn head_allocation_never_drops_below_floor() {
    let mut head = 1.0;
    for _ in 0..20 {
        head = allocate(None, Some(head));
        assert!(head >= HEAD_FLOOR);
    }
    assert_eq!(head, HEAD_FLOOR);
}

#[test]
fn allocate_at_uses_index_neighbours() {
    let siblings = items(&[1.0, 2.0, 4.0]);
    assert_eq!(allocate_at(&siblings, 0), 0.5);
    assert_eq!(allocate_at(&siblings, 2), 3.0);
    assert_eq!(allocate_at(&siblings, 3), 5.0);
    // Out of range clamps to the tail
    assert_eq!(allocate_at(&siblings, 99), 5.0);
    assert_eq!(allocate_at::<TaskStatus, Task>(&[], 0), 1.0);
}

#[test]
fn repeated_bisection_is_detected() {
    let records = vec![
        task("A", TaskStatus::Todo, 1.0),
        task("B", TaskStatus::Todo, 2.0),
        task("M", TaskStatus::Done, 1.0),
        task("N", TaskStatus::Done, 2.0),
    ];
    let mut board = OrderedCollection::from_records(records).unwrap();

    // Alternate two movers into the slot right after A; the gap above A
    // halves every round.
    let mut exhausted_after = None;
    for round in 0..100 {
        let (mover, parked) = if round % 2 == 0 { ("M", "N") } else { ("N", "M") };
        let outcome = move_item(&board, &mover.into(), &DropTarget::at(TaskStatus::Todo, 1))
            .expect("mover is in done");
        board = outcome.collection;
        if outcome.needs_renormalize {
            exhausted_after = Some(round);
            break;
        }
        if board.container_of(&parked.into()) == Some(&TaskStatus::Todo) {
            board = move_item(&board, &parked.into(), &DropTarget::end_of(TaskStatus::Done))
                .expect("parked item can leave todo")
                .collection;
        }
    }

    let rounds = exhausted_after.expect("precision never ran out");
    assert!(rounds > 20, "exhausted too early, after {rounds} rounds");
    board.check_invariants().unwrap();

    let repaired = board.renormalized(&TaskStatus::Todo);
    let positions: Vec<f64> = repaired.partition(&TaskStatus::Todo).iter().map(|i| i.position).collect();
    let expected: Vec<f64> = (1..=positions.len()).map(|n| n as f64).collect();
    assert_eq!(positions, expected);
    assert_eq!(
        ids(&repaired, &TaskStatus::Todo),
        ids(&board, &TaskStatus::Todo),
        "renormalizing must keep the order"
    );
}

#[test]
fn renormalize_repairs_a_tight_partition() {
    let tight = items(&[1.0, 1.0 + 1e-12, 1.0 + 2e-12]);
    assert!(min_gap(&tight).unwrap() < 1e-9);
    assert!(is_exhausted(Some(1.0), 1.0, Some(1.0 + 1e-12)));

    let spread = renormalize(&tight);
    assert_eq!(spread.iter().map(|i| i.position).collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
    assert_eq!(min_gap(&spread), Some(1.0));
}
