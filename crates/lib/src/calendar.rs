//! Due-date calendar derived from a board.
//!
//! [`CalendarIndex`] groups tasks with a due date by day. It registers as a
//! [`NotificationSink`] on the board pipeline; any settled mutation marks it
//! stale and the next [`CalendarIndex::refresh_if_stale`] rebuilds it.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::Result;
use crate::board::{Priority, Task, TaskStatus};
use crate::collection::OrderedCollection;
use crate::item::ItemId;
use crate::reconcile::{ChangeEvent, NotificationSink};

/// A task as shown on a calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEntry {
    pub id: ItemId,
    pub title: String,
    pub status: TaskStatus,
    pub priority: Option<Priority>,
}

#[derive(Debug, Default)]
struct CalendarState {
    days: BTreeMap<NaiveDate, Vec<CalendarEntry>>,
    stale: bool,
    rebuilds: u64,
}

/// Tasks grouped by due date.
#[derive(Debug, Default)]
pub struct CalendarIndex {
    state: Mutex<CalendarState>,
}

impl CalendarIndex {
    /// Build an index from the current board.
    pub fn new(board: &OrderedCollection<TaskStatus, Task>) -> Self {
        let index = Self::default();
        index.rebuild(board);
        index
    }

    /// Regroup every dated task. Within a day, entries follow board column
    /// order and then position.
    pub fn rebuild(&self, board: &OrderedCollection<TaskStatus, Task>) {
        let mut days: BTreeMap<NaiveDate, Vec<CalendarEntry>> = BTreeMap::new();
        for status in TaskStatus::ALL {
            for card in board.partition(&status) {
                if let Some(due) = card.payload.due_date {
                    days.entry(due).or_default().push(CalendarEntry {
                        id: card.id.clone(),
                        title: card.payload.title.clone(),
                        status,
                        priority: card.payload.priority,
                    });
                }
            }
        }

        let mut state = self.state.lock().unwrap();
        state.days = days;
        state.stale = false;
        state.rebuilds += 1;
        debug!(days = state.days.len(), "Calendar rebuilt");
    }

    /// Rebuild if a change was reported since the last build.
    ///
    /// Returns true if a rebuild happened.
    pub fn refresh_if_stale(&self, board: &OrderedCollection<TaskStatus, Task>) -> bool {
        if !self.is_stale() {
            return false;
        }
        self.rebuild(board);
        true
    }

    pub fn is_stale(&self) -> bool {
        self.state.lock().unwrap().stale
    }

    /// Number of rebuilds so far.
    pub fn rebuilds(&self) -> u64 {
        self.state.lock().unwrap().rebuilds
    }

    /// Entries due on `date`.
    pub fn day(&self, date: NaiveDate) -> Vec<CalendarEntry> {
        self.state
            .lock()
            .unwrap()
            .days
            .get(&date)
            .cloned()
            .unwrap_or_default()
    }

    /// Days of one month that have entries. An invalid month is empty.
    pub fn month(&self, year: i32, month: u32) -> BTreeMap<NaiveDate, Vec<CalendarEntry>> {
        let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
            return BTreeMap::new();
        };
        self.state
            .lock()
            .unwrap()
            .days
            .range(first..)
            .take_while(|(date, _)| date.month() == month && date.year() == year)
            .map(|(date, entries)| (*date, entries.clone()))
            .collect()
    }
}

impl NotificationSink<TaskStatus> for CalendarIndex {
    fn on_change(&self, event: &ChangeEvent<TaskStatus>) -> Result<()> {
        debug!(item = %event.item, cause = ?event.cause, "Calendar invalidated");
        self.state.lock().unwrap().stale = true;
        Ok(())
    }
}
