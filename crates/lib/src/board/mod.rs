//! The kanban board: tasks ordered within status columns.
//!
//! Columns are a flat enumeration, so moves between them never need cycle
//! checks. New tasks go to the head of their column; status changes made
//! from a task's side panel land at the head of the new column as well.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::item::{ContainerKey, ItemId, ItemPatch, Payload};
use crate::pipeline::{Intent, Placement};
use crate::resolver::DropTarget;

pub mod view;

pub use view::{AssigneeFilter, BoardFilter, SortBy, assignee_options, visible_columns};

/// Board column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    /// All columns, left to right.
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    /// Column heading.
    pub fn title(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "Todo",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Done => "Done",
        }
    }
}

impl ContainerKey for TaskStatus {}

/// Task priority, ordered from least to most pressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

/// A task card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub title: String,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub priority: Option<Priority>,
    /// User id of the assignee
    #[serde(default)]
    pub assignee: Option<String>,
}

impl Task {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            due_date: None,
            priority: None,
            assignee: None,
        }
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }
}

/// Partial update of a [`Task`].
///
/// `None` leaves a field alone; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub due_date: Option<Option<NaiveDate>>,
    pub priority: Option<Option<Priority>>,
    pub assignee: Option<Option<String>>,
}

impl TaskPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn due_date(due_date: Option<NaiveDate>) -> Self {
        Self {
            due_date: Some(due_date),
            ..Self::default()
        }
    }

    pub fn priority(priority: Option<Priority>) -> Self {
        Self {
            priority: Some(priority),
            ..Self::default()
        }
    }

    pub fn assignee(assignee: Option<String>) -> Self {
        Self {
            assignee: Some(assignee),
            ..Self::default()
        }
    }
}

impl Payload for Task {
    type Patch = TaskPatch;

    fn apply(&mut self, patch: &TaskPatch) {
        // A task never loses its title
        if let Some(title) = &patch.title
            && !title.trim().is_empty()
        {
            self.title = title.trim().to_string();
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = due_date;
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(assignee) = &patch.assignee {
            self.assignee = assignee.clone();
        }
    }

    fn coalesce(pending: &mut TaskPatch, newer: TaskPatch) {
        if newer.title.is_some() {
            pending.title = newer.title;
        }
        if newer.due_date.is_some() {
            pending.due_date = newer.due_date;
        }
        if newer.priority.is_some() {
            pending.priority = newer.priority;
        }
        if newer.assignee.is_some() {
            pending.assignee = newer.assignee;
        }
    }
}

/// Create a task at the head of `status`.
pub fn create_task(status: TaskStatus, task: Task) -> Intent<TaskStatus, Task> {
    Intent::Create {
        container: status,
        payload: task,
        placement: Placement::Head,
    }
}

/// Update a task's fields, optionally moving it to another column.
pub fn update_task(
    id: impl Into<ItemId>,
    status: Option<TaskStatus>,
    patch: TaskPatch,
) -> Intent<TaskStatus, Task> {
    let mut patch = ItemPatch::payload(patch);
    patch.container = status;
    Intent::Update {
        id: id.into(),
        patch,
    }
}

/// Drag a task to `target`.
pub fn move_task(id: impl Into<ItemId>, target: DropTarget<TaskStatus>) -> Intent<TaskStatus, Task> {
    Intent::Move {
        id: id.into(),
        target,
    }
}

pub fn delete_task(id: impl Into<ItemId>) -> Intent<TaskStatus, Task> {
    Intent::Delete { id: id.into() }
}
