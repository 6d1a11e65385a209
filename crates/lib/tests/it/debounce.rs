use std::time::Duration;

use tokio::time::sleep;

use orderly::{
    ItemId, Pipeline,
    board::{Task, TaskPatch, TaskStatus},
    collaborators::StoreCall,
    pipeline::SaveState,
    tree::PagePatch,
};

use crate::helpers::*;

fn title(pipeline: &Pipeline<TaskStatus, Task>, id: &str) -> String {
    pipeline
        .with_view(|view| view.get(&id.into()).map(|item| item.payload.title.clone()))
        .expect("item in view")
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_become_one_write() {
    let (store, pipeline) = board(two_card_board()).await;
    let editor = pipeline.debouncer();
    assert_eq!(editor.delay(), Duration::from_millis(1500));
    let x = ItemId::new("X");

    for text in ["R", "Re", "Ren", "Rena", "Renamed"] {
        editor.edit("X", TaskPatch::title(text)).unwrap();
        sleep(Duration::from_millis(300)).await;
        // Every keystroke is visible at once
        assert_eq!(title(&pipeline, "X"), text);
    }
    assert_eq!(store.write_count(), 0);
    assert_eq!(editor.save_state(&x), SaveState::Pending);
    assert!(editor.is_busy());

    sleep(Duration::from_millis(1300)).await;
    assert_eq!(store.write_count(), 1);
    match store.calls().last() {
        Some(StoreCall::Update { id, patch }) => {
            assert_eq!(id, &x);
            assert_eq!(patch.payload.title.as_deref(), Some("Renamed"));
            assert_eq!(patch.container, None);
        }
        other => panic!("expected an update, got {other:?}"),
    }
    assert_eq!(editor.save_state(&x), SaveState::Saved);
    assert!(!editor.is_busy());
    assert!(!pipeline.view().get(&x).unwrap().optimistic);
}

#[tokio::test(start_paused = true)]
async fn edits_to_different_fields_are_merged() {
    let (store, pipeline) = board(two_card_board()).await;
    let editor = pipeline.debouncer();

    editor.edit("X", TaskPatch::title("Call the plumber")).unwrap();
    editor.edit("X", TaskPatch::assignee(Some("ana".into()))).unwrap();
    sleep(Duration::from_millis(1600)).await;

    assert_eq!(store.write_count(), 1);
    let stored = store.get(&"X".into()).unwrap();
    assert_eq!(stored.payload.title, "Call the plumber");
    assert_eq!(stored.payload.assignee.as_deref(), Some("ana"));
}

#[tokio::test(start_paused = true)]
async fn items_are_debounced_independently() {
    let (store, pipeline) = board(two_card_board()).await;
    let editor = pipeline.debouncer();

    editor.edit("X", TaskPatch::title("x1")).unwrap();
    sleep(Duration::from_millis(1000)).await;
    editor.edit("Y", TaskPatch::title("y1")).unwrap();
    sleep(Duration::from_millis(600)).await;

    // X has been quiet long enough, Y has not
    assert_eq!(store.write_count(), 1);
    assert_eq!(editor.save_state(&"Y".into()), SaveState::Pending);
    sleep(Duration::from_millis(1000)).await;
    assert_eq!(store.write_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn flush_and_cancel() {
    let (store, pipeline) = board(two_card_board()).await;
    let editor = pipeline.debouncer();

    editor.edit("X", TaskPatch::title("now")).unwrap();
    editor.flush(&"X".into()).await.unwrap();
    assert_eq!(store.write_count(), 1);
    assert_eq!(store.get(&"X".into()).unwrap().payload.title, "now");

    // Nothing left for the timer to send
    sleep(Duration::from_millis(2000)).await;
    assert_eq!(store.write_count(), 1);

    editor.edit("Y", TaskPatch::title("never sent")).unwrap();
    assert!(editor.cancel(&"Y".into()));
    assert!(!editor.cancel(&"Y".into()));
    sleep(Duration::from_millis(2000)).await;
    assert_eq!(store.write_count(), 1);
    // The local edit stays
    assert_eq!(title(&pipeline, "Y"), "never sent");
    assert_eq!(editor.save_state(&"Y".into()), SaveState::Idle);

    editor.edit("X", TaskPatch::title("a")).unwrap();
    editor.edit("Y", TaskPatch::title("b")).unwrap();
    editor.flush_all().await.unwrap();
    assert_eq!(store.write_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn failed_write_keeps_local_edits() {
    let (store, pipeline) = board(two_card_board()).await;
    let editor = pipeline.debouncer();

    store.fail_next(offline());
    editor.edit("X", TaskPatch::title("unsaved")).unwrap();
    sleep(Duration::from_millis(1600)).await;

    assert_eq!(title(&pipeline, "X"), "unsaved");
    assert!(pipeline.view().get(&"X".into()).unwrap().optimistic);
    assert!(matches!(editor.save_state(&"X".into()), SaveState::Failed(_)));
    assert_eq!(store.get(&"X".into()).unwrap().payload.title, "X");

    // The failed patch is retried together with the next edit
    editor.edit("X", TaskPatch::assignee(Some("ana".into()))).unwrap();
    editor.flush(&"X".into()).await.unwrap();
    let stored = store.get(&"X".into()).unwrap();
    assert_eq!(stored.payload.title, "unsaved");
    assert_eq!(stored.payload.assignee.as_deref(), Some("ana"));
    assert_eq!(editor.save_state(&"X".into()), SaveState::Saved);
}

#[tokio::test(start_paused = true)]
async fn failed_write_can_be_flushed_again() {
    let (store, pipeline) = board(two_card_board()).await;
    let editor = pipeline.debouncer();

    store.fail_next(offline());
    editor.edit("X", TaskPatch::title("retry me")).unwrap();
    let err = editor.flush(&"X".into()).await.unwrap_err();
    assert!(matches!(&err, orderly::Error::Pipeline(e) if e.is_save_failure()));
    assert_eq!(
        err.user_message(),
        "Could not save your changes. They are kept locally."
    );

    editor.flush_all().await.unwrap();
    assert_eq!(store.get(&"X".into()).unwrap().payload.title, "retry me");
}

#[tokio::test(start_paused = true)]
async fn slow_confirmation_does_not_overwrite_newer_text() {
    let store = GatedStore::new(two_card_board());
    let pipeline: Pipeline<TaskStatus, Task> = open(&store).await;
    let editor = pipeline.debouncer();

    let gate = store.hold_next();
    editor.edit("X", TaskPatch::title("first")).unwrap();
    sleep(Duration::from_millis(1600)).await;
    assert_eq!(editor.save_state(&"X".into()), SaveState::Saving);

    // Typed while the first write is in flight
    editor.edit("X", TaskPatch::title("second")).unwrap();
    gate.release();
    sleep(Duration::from_millis(10)).await;
    assert_eq!(store.inner.get(&"X".into()).unwrap().payload.title, "first");
    assert_eq!(title(&pipeline, "X"), "second");
    assert_eq!(editor.save_state(&"X".into()), SaveState::Pending);

    sleep(Duration::from_millis(1600)).await;
    assert_eq!(store.inner.get(&"X".into()).unwrap().payload.title, "second");
    assert_eq!(title(&pipeline, "X"), "second");
    assert_eq!(editor.save_state(&"X".into()), SaveState::Saved);
}

#[tokio::test(start_paused = true)]
async fn page_content_edits_are_debounced() {
    let (store, pipeline) = tree(sample_tree()).await;
    let editor = pipeline.debouncer();

    for n in 0..10 {
        let doc = serde_json::json!({ "blocks": [{ "text": format!("draft {n}") }] });
        editor.edit("C1", PagePatch::content(doc)).unwrap();
        sleep(Duration::from_millis(100)).await;
    }
    editor.edit("C1", PagePatch::title("Meeting notes")).unwrap();
    sleep(Duration::from_millis(1600)).await;

    assert_eq!(store.write_count(), 1);
    let stored = store.get(&"C1".into()).unwrap();
    assert_eq!(stored.payload.title, "Meeting notes");
    assert_eq!(stored.payload.content["blocks"][0]["text"], "draft 9");
    // Position and parent are untouched by content edits
    assert_eq!(stored.container, Some(ItemId::new("P1")));
    assert_eq!(stored.position, 1.0);
}

#[tokio::test(start_paused = true)]
async fn edits_of_unknown_items_fail_fast() {
    let (_store, pipeline) = board(two_card_board()).await;
    let editor = pipeline.debouncer();
    let err = editor.edit("ghost", TaskPatch::title("boo")).unwrap_err();
    assert!(err.is_not_found());
    assert!(!editor.is_busy());
}
