//! Per-day views of the task list.
//!
//! Days are UTC calendar dates, the same timezone task timestamps are
//! recorded in.

use std::collections::BTreeMap;

use checkdone_api::v1::{DayMarker, Task};
use chrono::{Datelike, NaiveDate};

/// The day a task is shown on: its reminder day, else its creation day.
pub fn task_day(task: &Task) -> NaiveDate {
    task.reminder_date.unwrap_or(task.created_at).date_naive()
}

pub fn group_by_day(tasks: &[Task]) -> BTreeMap<NaiveDate, Vec<&Task>> {
    let mut days: BTreeMap<NaiveDate, Vec<&Task>> = BTreeMap::new();

    for task in tasks {
        days.entry(task_day(task)).or_default().push(task);
    }

    days
}

pub fn day_marker(tasks: &[&Task]) -> Option<DayMarker> {
    let completed = tasks.iter().any(|task| task.is_completed());
    let active = tasks.iter().any(|task| !task.is_completed());

    match (active, completed) {
        (true, true) => Some(DayMarker::Mixed),
        (false, true) => Some(DayMarker::Done),
        (true, false) => Some(DayMarker::Active),
        (false, false) => None,
    }
}

pub fn day_markers(tasks: &[Task]) -> BTreeMap<NaiveDate, DayMarker> {
    (group_by_day(tasks).into_iter())
        .filter_map(|(day, tasks)| day_marker(&tasks).map(|marker| (day, marker)))
        .collect()
}

pub fn tasks_on(tasks: &[Task], day: NaiveDate) -> Vec<&Task> {
    (tasks.iter()).filter(|task| task_day(task) == day).collect()
}

/// Tasks can't be added to days that already passed.
pub fn can_add_on(day: NaiveDate, today: NaiveDate) -> bool {
    day >= today
}

/// Free users only see the current month.
pub fn can_browse_month(is_premium: bool, today: NaiveDate, month: NaiveDate) -> bool {
    is_premium || (month.year() == today.year() && month.month() == today.month())
}
