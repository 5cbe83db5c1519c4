use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum number of active tasks on the free tier.
pub const FREE_TASK_LIMIT: usize = 20;

/// Length of a premium window, in days.
pub const PREMIUM_DAYS: i64 = 30;

pub const DEFAULT_CATEGORIES: [&str; 4] = ["Work", "Personal", "Shopping", "Health"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Active,
    Completed { at: DateTime<Utc> },
}

impl TaskStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed { .. })
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            TaskStatus::Active => None,
            TaskStatus::Completed { at } => Some(*at),
        }
    }
}

/// Handle returned by a notification service for one scheduled reminder.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(pub String);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "TaskRecord", into = "TaskRecord")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub category: Option<String>,
    pub reminder_date: Option<DateTime<Utc>>,
    pub notification: Option<NotificationId>,
}

impl Task {
    pub fn new(title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            status: TaskStatus::Active,
            created_at,
            category: None,
            reminder_date: None,
            notification: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status.is_completed()
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.status.completed_at()
    }
}

/// Flat storage shape of a [`Task`].
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskRecord {
    id: Uuid,
    title: String,
    completed: bool,
    created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reminder_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notification_id: Option<NotificationId>,
}

impl From<TaskRecord> for Task {
    fn from(record: TaskRecord) -> Self {
        // a completed record without a timestamp counts as completed on creation
        let status = match (record.completed, record.completed_at) {
            (false, _) => TaskStatus::Active,
            (true, at) => TaskStatus::Completed {
                at: at.unwrap_or(record.created_at),
            },
        };

        Self {
            id: record.id,
            title: record.title,
            status,
            created_at: record.created_at,
            category: record.category,
            reminder_date: record.reminder_date,
            notification: record.notification_id,
        }
    }
}

impl From<Task> for TaskRecord {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            completed: task.status.is_completed(),
            created_at: task.created_at,
            completed_at: task.status.completed_at(),
            category: task.category,
            reminder_date: task.reminder_date,
            notification_id: task.notification,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Entitlement {
    #[default]
    Free,
    /// `since` is `None` for grants stored without an activation date, which
    /// have no window.
    Premium { since: Option<DateTime<Utc>> },
}

impl Entitlement {
    pub fn is_premium(&self) -> bool {
        matches!(self, Entitlement::Premium { .. })
    }

    pub fn since(&self) -> Option<DateTime<Utc>> {
        match self {
            Entitlement::Free => None,
            Entitlement::Premium { since } => *since,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PremiumWindow {
    pub expires_at: DateTime<Utc>,
    pub remaining_days: i64,
}

impl PremiumWindow {
    pub fn compute(since: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let expires_at = since + Duration::days(PREMIUM_DAYS);
        let left = expires_at - now;

        let remaining_days = match left.num_days() {
            _ if left <= Duration::zero() => 0,
            whole if left > Duration::days(whole) => whole + 1,
            whole => whole,
        };

        Self {
            expires_at,
            remaining_days,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Calendar mark for a day holding at least one task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DayMarker {
    Active,
    Done,
    Mixed,
}
