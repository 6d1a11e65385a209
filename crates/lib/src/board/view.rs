//! Filtered and sorted read view of a board.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use super::{Priority, Task, TaskStatus};
use crate::collection::OrderedCollection;
use crate::item::OrderedItem;

/// Whose tasks to show.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AssigneeFilter {
    #[default]
    All,
    /// Tasks assigned to the current user
    Mine,
    Unassigned,
    User(String),
}

/// Card filters of the board toolbar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardFilter {
    /// Case-insensitive title substring; blank matches everything
    pub query: String,
    pub priority: Option<Priority>,
    pub assignee: AssigneeFilter,
}

impl BoardFilter {
    /// True if `task` passes every filter. `current_user` resolves
    /// [`AssigneeFilter::Mine`].
    pub fn matches(&self, task: &Task, current_user: Option<&str>) -> bool {
        let query = self.query.trim().to_lowercase();
        if !query.is_empty() && !task.title.to_lowercase().contains(&query) {
            return false;
        }
        if self.priority.is_some() && task.priority != self.priority {
            return false;
        }
        match &self.assignee {
            AssigneeFilter::All => true,
            AssigneeFilter::Mine => {
                current_user.is_some() && task.assignee.as_deref() == current_user
            }
            AssigneeFilter::Unassigned => task.assignee.is_none(),
            AssigneeFilter::User(user) => task.assignee.as_deref() == Some(user.as_str()),
        }
    }
}

/// Card order within a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortBy {
    /// The stored order
    #[default]
    Position,
    /// Earliest due date first, undated last
    DueDate,
    /// Most pressing first, no priority last
    Priority,
}

impl SortBy {
    /// Dragging only makes sense when the visible order is the stored order.
    pub fn allows_drag(&self) -> bool {
        matches!(self, SortBy::Position)
    }

    fn compare(&self, left: &OrderedItem<TaskStatus, Task>, right: &OrderedItem<TaskStatus, Task>) -> Ordering {
        let by_position = left.position.total_cmp(&right.position);
        match self {
            SortBy::Position => by_position,
            SortBy::DueDate => match (left.payload.due_date, right.payload.due_date) {
                (Some(l), Some(r)) => l.cmp(&r),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
            .then(by_position),
            SortBy::Priority => right
                .payload
                .priority
                .cmp(&left.payload.priority)
                .then(by_position),
        }
    }
}

/// The cards of every column after filtering and sorting.
///
/// All columns are returned, in board order, including empty ones.
pub fn visible_columns(
    board: &OrderedCollection<TaskStatus, Task>,
    filter: &BoardFilter,
    sort: SortBy,
    current_user: Option<&str>,
) -> Vec<(TaskStatus, Vec<OrderedItem<TaskStatus, Task>>)> {
    TaskStatus::ALL
        .iter()
        .map(|status| {
            let mut cards: Vec<_> = board
                .partition(status)
                .iter()
                .filter(|card| filter.matches(&card.payload, current_user))
                .cloned()
                .collect();
            cards.sort_by(|l, r| sort.compare(l, r));
            (*status, cards)
        })
        .collect()
}

/// Distinct assignees on the board, sorted.
pub fn assignee_options(board: &OrderedCollection<TaskStatus, Task>) -> Vec<String> {
    board
        .iter()
        .filter_map(|card| card.payload.assignee.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
