//! The canonical drag-and-drop flows, end to end.

use orderly::{
    ItemId, Pipeline,
    board::{Task, TaskStatus, move_task},
    collaborators::StoreCall,
    resolver::DropTarget,
    tree::{Page, create_page},
};

use crate::helpers::*;

/// Reordering within a column puts `Y` ahead of `X` at half of `X`'s position.
#[tokio::test]
async fn reorder_card_to_head_of_column() {
    let (store, pipeline) = board(two_card_board()).await;

    let outcome = pipeline
        .run(move_task("Y", DropTarget::on_sibling(TaskStatus::Todo, "X")))
        .await
        .unwrap();
    assert_eq!(outcome.item().unwrap().position, 0.5);
    assert_eq!(ids(&pipeline.view(), &TaskStatus::Todo), vec!["Y", "X"]);

    assert_eq!(
        store.calls().last(),
        Some(&StoreCall::Move {
            id: "Y".into(),
            container: TaskStatus::Todo,
            position: 0.5,
        })
    );
    // X was never written
    assert_eq!(store.write_count(), 1);
}

/// A page created under a childless parent gets position 1.
#[tokio::test]
async fn create_first_child_page() {
    let (_store, pipeline) = tree(vec![page("Page1", None, 1.0), page("Page2", None, 2.0)]).await;

    let outcome = pipeline
        .run(create_page(Some("Page1".into()), Page::untitled()))
        .await
        .unwrap();
    let child = outcome.item().unwrap();
    assert_eq!(child.container, Some(ItemId::new("Page1")));
    assert_eq!(child.position, 1.0);
    assert_eq!(ids(&pipeline.view(), &None), vec!["Page1", "Page2"]);
}

/// Dropping a card into an empty column gives it position 1 there.
#[tokio::test]
async fn drag_card_into_empty_column() {
    let (store, pipeline) = board(vec![task("TaskA", TaskStatus::Todo, 1.0)]).await;

    let outcome = pipeline
        .run(move_task("TaskA", DropTarget::end_of(TaskStatus::Done)))
        .await
        .unwrap();
    let moved = outcome.item().unwrap();
    assert_eq!(moved.container, TaskStatus::Done);
    assert_eq!(moved.position, 1.0);

    let stored = store.get(&"TaskA".into()).unwrap();
    assert_eq!((stored.container, stored.position), (TaskStatus::Done, 1.0));
}

/// The same drag, rejected by the network: the board ends up as it started.
#[tokio::test]
async fn rejected_drag_is_undone() {
    let store = GatedStore::new(vec![task("TaskA", TaskStatus::Todo, 1.0)]);
    let pipeline: Pipeline<TaskStatus, Task> = open(&store).await;
    let before = pipeline.view();

    let gate = store.hold_next();
    let drag = start(&pipeline, move_task("TaskA", DropTarget::end_of(TaskStatus::Done))).await;
    // Optimistically in done
    assert_eq!(pipeline.view().container_of(&"TaskA".into()), Some(&TaskStatus::Done));

    gate.fail(offline());
    let err = drag.await.unwrap().unwrap_err();
    assert!(err.is_rolled_back());
    assert!(err.to_string().contains("rolled back"));

    assert_eq!(pipeline.view(), before);
    let task_a = pipeline.view().get(&"TaskA".into()).cloned().unwrap();
    assert_eq!((task_a.container, task_a.position), (TaskStatus::Todo, 1.0));
    assert!(!task_a.optimistic);
}
