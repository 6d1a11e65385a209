use std::sync::Arc;

use chrono::NaiveDate;

use orderly::{
    Pipeline,
    board::{
        Priority, Task, TaskPatch, TaskStatus, create_task, delete_task, move_task, update_task,
        view::{AssigneeFilter, BoardFilter, SortBy, assignee_options, visible_columns},
    },
    calendar::CalendarIndex,
    collaborators::InMemoryStore,
    resolver::DropTarget,
};

use crate::helpers::*;

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
}

fn planned_board() -> Vec<orderly::Record<TaskStatus, Task>> {
    let mut records = vec![
        task("write", TaskStatus::Todo, 1.0),
        task("review", TaskStatus::Todo, 2.0),
        task("ship", TaskStatus::InProgress, 1.0),
        task("plan", TaskStatus::Done, 1.0),
    ];
    records[0].payload = Task::new("Write the report")
        .with_due_date(date(14))
        .with_priority(Priority::High)
        .with_assignee("ana");
    records[1].payload = Task::new("Review budget").with_due_date(date(3));
    records[2].payload = Task::new("Ship release")
        .with_priority(Priority::Urgent)
        .with_assignee("ben");
    records[3].payload = Task::new("Plan sprint").with_due_date(date(3)).with_assignee("ana");
    records
}

fn column_ids(columns: &[(TaskStatus, Vec<orderly::OrderedItem<TaskStatus, Task>>)], status: TaskStatus) -> Vec<String> {
    columns
        .iter()
        .find(|(s, _)| *s == status)
        .map(|(_, cards)| cards.iter().map(|c| c.id.to_string()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn task_lifecycle() {
    let (store, pipeline) = board(planned_board()).await;

    let created = pipeline
        .run(create_task(TaskStatus::Todo, Task::new("Draft agenda")))
        .await
        .unwrap();
    let id = created.item().unwrap().id.clone();
    assert_eq!(store.get(&id).unwrap().payload.title, "Draft agenda");

    pipeline
        .run(update_task(id.clone(), None, TaskPatch::due_date(Some(date(20)))))
        .await
        .unwrap();
    pipeline
        .run(move_task(id.clone(), DropTarget::on_sibling(TaskStatus::Todo, "write")))
        .await
        .unwrap();
    assert_eq!(ids(&pipeline.view(), &TaskStatus::Todo)[0], id.to_string());

    pipeline
        .run(update_task(id.clone(), Some(TaskStatus::Done), TaskPatch::default()))
        .await
        .unwrap();
    assert_eq!(pipeline.view().container_of(&id), Some(&TaskStatus::Done));
    assert_eq!(ids(&pipeline.view(), &TaskStatus::Done)[0], id.to_string());

    pipeline.run(delete_task(id.clone())).await.unwrap();
    assert!(!pipeline.view().contains(&id));
    assert!(store.get(&id).is_none());
    pipeline.view().check_invariants().unwrap();
}

#[tokio::test]
async fn blank_title_edits_are_ignored() {
    let (_store, pipeline) = board(planned_board()).await;
    pipeline
        .run(update_task("write", None, TaskPatch::title("   ")))
        .await
        .unwrap();
    assert_eq!(
        pipeline.view().get(&"write".into()).unwrap().payload.title,
        "Write the report"
    );
}

#[tokio::test]
async fn filters_and_sorting() {
    let (_store, pipeline) = board(planned_board()).await;
    let view = pipeline.view();

    let everything = visible_columns(&view, &BoardFilter::default(), SortBy::Position, None);
    assert_eq!(everything.len(), 3);
    assert_eq!(column_ids(&everything, TaskStatus::Todo), vec!["write", "review"]);

    let by_due = visible_columns(&view, &BoardFilter::default(), SortBy::DueDate, None);
    assert_eq!(column_ids(&by_due, TaskStatus::Todo), vec!["review", "write"]);
    assert!(!SortBy::DueDate.allows_drag());

    let mine = BoardFilter {
        assignee: AssigneeFilter::Mine,
        ..Default::default()
    };
    let columns = visible_columns(&view, &mine, SortBy::Position, Some("ana"));
    assert_eq!(column_ids(&columns, TaskStatus::Todo), vec!["write"]);
    assert_eq!(column_ids(&columns, TaskStatus::Done), vec!["plan"]);
    assert!(column_ids(&columns, TaskStatus::InProgress).is_empty());

    // Without a signed-in user "mine" matches nothing
    let nobody = visible_columns(&view, &mine, SortBy::Position, None);
    assert!(nobody.iter().all(|(_, cards)| cards.is_empty()));

    let query = BoardFilter {
        query: " SHIP ".into(),
        ..Default::default()
    };
    let columns = visible_columns(&view, &query, SortBy::Priority, None);
    assert_eq!(column_ids(&columns, TaskStatus::InProgress), vec!["ship"]);

    let unassigned = BoardFilter {
        assignee: AssigneeFilter::Unassigned,
        priority: None,
        ..Default::default()
    };
    let columns = visible_columns(&view, &unassigned, SortBy::Position, None);
    assert_eq!(column_ids(&columns, TaskStatus::Todo), vec!["review"]);

    assert_eq!(assignee_options(&view), vec!["ana", "ben"]);
}

#[tokio::test]
async fn calendar_follows_board_changes() {
    let store = Arc::new(InMemoryStore::with_records(planned_board()));
    let pipeline = Pipeline::<TaskStatus, Task>::builder(store.clone())
        .open(store.as_ref())
        .await
        .unwrap();
    let calendar = Arc::new(CalendarIndex::new(&pipeline.view()));
    pipeline.add_sink(calendar.clone());

    let third: Vec<String> = calendar.day(date(3)).into_iter().map(|e| e.id.to_string()).collect();
    assert_eq!(third, vec!["review", "plan"]);

    pipeline
        .run(update_task("review", None, TaskPatch::due_date(Some(date(14)))))
        .await
        .unwrap();
    assert!(calendar.is_stale());
    assert!(calendar.refresh_if_stale(&pipeline.view()));

    let third: Vec<String> = calendar.day(date(3)).into_iter().map(|e| e.id.to_string()).collect();
    assert_eq!(third, vec!["plan"]);
    assert_eq!(calendar.day(date(14)).len(), 2);
    assert_eq!(calendar.month(2025, 3).len(), 2);
    assert_eq!(calendar.rebuilds(), 2);
}
