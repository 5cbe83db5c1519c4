use checkdone_api::v1::{Task, TaskStatus, FREE_TASK_LIMIT};
use chrono::{DateTime, NaiveDate, Utc};
use eyre::WrapErr;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    notify::Notifier,
    persist::{KeyValueStore, TASKS_KEY},
};

/// What gets cancelled when a task with a reminder is completed or removed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderCancellation {
    /// Only the task's own notification, on completion and on removal.
    #[default]
    PerTask,
    /// Every pending notification on completion, nothing on removal.
    All,
}

/// Owns the task collection, newest first.
#[derive(Debug)]
pub struct TaskStore<S, N> {
    store: S,
    notifier: N,
    cancellation: ReminderCancellation,
    tasks: Vec<Task>,
}

impl<S: KeyValueStore, N: Notifier> TaskStore<S, N> {
    pub async fn load(
        store: S,
        notifier: N,
        cancellation: ReminderCancellation,
    ) -> eyre::Result<Self> {
        let tasks: Vec<Task> = match store.get(TASKS_KEY).await.wrap_err("failed to read tasks")? {
            Some(bytes) => serde_json::from_slice(&bytes).wrap_err("failed to parse tasks")?,
            None => Vec::new(),
        };

        debug!(count = tasks.len(), "loaded tasks");

        Ok(Self {
            store,
            notifier,
            cancellation,
            tasks,
        })
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub async fn add(
        &mut self,
        title: &str,
        category: Option<String>,
        reminder: Option<DateTime<Utc>>,
    ) -> eyre::Result<Option<&Task>> {
        self.add_at(title, category, reminder, Utc::now()).await
    }

    /// Prepend a new task. A blank title is ignored and yields `None`.
    ///
    /// The free-tier limit is not checked here, see [`TaskStore::is_over_limit`].
    pub async fn add_at(
        &mut self,
        title: &str,
        category: Option<String>,
        reminder: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> eyre::Result<Option<&Task>> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(None);
        }

        let mut task = Task::new(title, now);
        task.category = category;
        task.reminder_date = reminder;

        info!(
            id = %task.id,
            title = %task.title,
            "created task"
        );

        self.tasks.insert(0, task);
        self.store().await?;

        if let Some(at) = reminder {
            match self.notifier.schedule(title, at).await {
                Ok(id) => {
                    self.tasks[0].notification = Some(id);
                    self.store().await?;
                }
                Err(err) => {
                    warn!(id = %self.tasks[0].id, "failed to schedule reminder: {:?}", err);
                }
            }
        }

        Ok(self.tasks.first())
    }

    pub async fn toggle(&mut self, id: Uuid) -> eyre::Result<Option<&Task>> {
        self.toggle_at(id, Utc::now()).await
    }

    /// Flip a task between active and completed. Unknown ids are ignored.
    pub async fn toggle_at(&mut self, id: Uuid, now: DateTime<Utc>) -> eyre::Result<Option<&Task>> {
        let Some(index) = self.tasks.iter().position(|task| task.id == id) else {
            return Ok(None);
        };

        let task = &mut self.tasks[index];
        task.status = match task.status {
            TaskStatus::Active => TaskStatus::Completed { at: now },
            TaskStatus::Completed { .. } => TaskStatus::Active,
        };

        info!(
            id = %task.id,
            status = ?task.status,
            "updated task status"
        );

        if task.is_completed() && task.reminder_date.is_some() {
            match self.cancellation {
                ReminderCancellation::PerTask => self.cancel_reminder(index).await,
                ReminderCancellation::All => {
                    if let Err(err) = self.notifier.cancel_all().await {
                        warn!("failed to cancel reminders: {:?}", err);
                    }
                }
            }
        }

        self.store().await?;

        Ok(self.tasks.get(index))
    }

    /// Delete a task. Unknown ids are ignored.
    pub async fn remove(&mut self, id: Uuid) -> eyre::Result<Option<Task>> {
        let Some(index) = self.tasks.iter().position(|task| task.id == id) else {
            return Ok(None);
        };

        if self.cancellation == ReminderCancellation::PerTask {
            self.cancel_reminder(index).await;
        }

        let task = self.tasks.remove(index);
        self.store().await?;

        info!(
            id = %task.id,
            title = %task.title,
            "deleted task"
        );

        Ok(Some(task))
    }

    pub fn active_count(&self) -> usize {
        (self.tasks.iter()).filter(|task| !task.is_completed()).count()
    }

    pub fn completed_count(&self) -> usize {
        (self.tasks.iter()).filter(|task| task.is_completed()).count()
    }

    pub fn total_count(&self) -> usize {
        self.tasks.len()
    }

    /// Share of completed tasks, `0.0` for an empty list.
    pub fn progress(&self) -> f64 {
        match self.total_count() {
            0 => 0.0,
            total => self.completed_count() as f64 / total as f64,
        }
    }

    pub fn is_over_limit(&self, is_premium: bool) -> bool {
        !is_premium && self.active_count() >= FREE_TASK_LIMIT
    }

    async fn cancel_reminder(&mut self, index: usize) {
        let task = &mut self.tasks[index];
        let Some(notification) = task.notification.take() else {
            return;
        };

        if let Err(err) = self.notifier.cancel(&notification).await {
            warn!(id = %task.id, %notification, "failed to cancel reminder: {:?}", err);
        }
    }

    async fn store(&self) -> eyre::Result<()> {
        let json = serde_json::to_vec(&self.tasks).wrap_err("failed to serialize tasks")?;

        self.store
            .set(TASKS_KEY, json)
            .await
            .wrap_err("failed to store tasks")
    }
}

/// For premium users, hide tasks completed before `today`. Active tasks and
/// tasks completed today always stay visible.
pub fn visible_for_premium_auto_hide(
    tasks: &[Task],
    is_premium: bool,
    today: NaiveDate,
) -> Vec<&Task> {
    (tasks.iter())
        .filter(|task| match task.completed_at() {
            Some(at) if is_premium => at.date_naive() >= today,
            _ => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use checkdone_api::v1::NotificationId;
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::persist::{MemoryStore, ReadOnlyStore};

    #[derive(Debug, Default, PartialEq)]
    struct Calls {
        scheduled: Vec<(String, DateTime<Utc>)>,
        cancelled: Vec<NotificationId>,
        cancelled_all: usize,
    }

    /// Records calls; refuses to schedule when `deny` is set.
    #[derive(Clone, Debug, Default)]
    struct FakeNotifier {
        deny: bool,
        calls: Arc<Mutex<Calls>>,
    }

    impl Notifier for FakeNotifier {
        async fn schedule(&self, body: &str, at: DateTime<Utc>) -> eyre::Result<NotificationId> {
            if self.deny {
                eyre::bail!("permission denied");
            }

            let mut calls = self.calls.lock().unwrap();
            calls.scheduled.push((body.to_owned(), at));
            Ok(NotificationId(format!("n{}", calls.scheduled.len())))
        }

        async fn cancel(&self, id: &NotificationId) -> eyre::Result<()> {
            self.calls.lock().unwrap().cancelled.push(id.clone());
            Ok(())
        }

        async fn cancel_all(&self) -> eyre::Result<()> {
            self.calls.lock().unwrap().cancelled_all += 1;
            Ok(())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap()
    }

    async fn empty(
        cancellation: ReminderCancellation,
    ) -> (TaskStore<MemoryStore, FakeNotifier>, MemoryStore, FakeNotifier) {
        let store = MemoryStore::new();
        let notifier = FakeNotifier::default();
        let tasks = TaskStore::load(store.clone(), notifier.clone(), cancellation)
            .await
            .unwrap();
        (tasks, store, notifier)
    }

    #[tokio::test]
    async fn blank_titles_are_ignored() {
        let (mut tasks, store, _) = empty(ReminderCancellation::PerTask).await;

        assert!(tasks.add_at("", None, None, now()).await.unwrap().is_none());
        assert!(tasks.add_at("   ", None, None, now()).await.unwrap().is_none());

        assert_eq!(tasks.total_count(), 0);
        assert_eq!(store.get(TASKS_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn new_tasks_go_first() {
        let (mut tasks, store, _) = empty(ReminderCancellation::PerTask).await;

        tasks.add_at("first", None, None, now()).await.unwrap();
        let task = tasks.add_at("  Buy milk ", None, None, now()).await.unwrap().unwrap();

        assert_eq!(task.title, "Buy milk");
        assert_eq!(task.status, TaskStatus::Active);
        assert_eq!(task.created_at, now());
        assert_eq!(tasks.total_count(), 2);
        assert_eq!(tasks.tasks()[1].title, "first");

        let stored: Vec<Task> =
            serde_json::from_slice(&store.get(TASKS_KEY).await.unwrap().unwrap()).unwrap();
        assert_eq!(stored, tasks.tasks());
    }

    #[tokio::test]
    async fn toggling_twice_restores_the_task() {
        let (mut tasks, _, _) = empty(ReminderCancellation::PerTask).await;
        let id = tasks.add_at("a", None, None, now()).await.unwrap().unwrap().id;
        let original = tasks.get(id).cloned().unwrap();

        let later = now() + Duration::hours(1);
        let done = tasks.toggle_at(id, later).await.unwrap().unwrap();
        assert!(done.is_completed());
        assert_eq!(done.completed_at(), Some(later));

        let undone = tasks.toggle_at(id, later).await.unwrap().unwrap();
        assert_eq!(undone, &original);
        assert_eq!(undone.completed_at(), None);
    }

    #[tokio::test]
    async fn unknown_ids_are_ignored() {
        let (mut tasks, _, _) = empty(ReminderCancellation::PerTask).await;
        tasks.add_at("a", None, None, now()).await.unwrap();

        assert!(tasks.toggle_at(Uuid::new_v4(), now()).await.unwrap().is_none());
        assert!(tasks.remove(Uuid::new_v4()).await.unwrap().is_none());
        assert_eq!(tasks.total_count(), 1);
    }

    #[tokio::test]
    async fn counts_and_progress() {
        let (mut tasks, _, _) = empty(ReminderCancellation::PerTask).await;
        assert_eq!(tasks.progress(), 0.0);

        for title in ["a", "b", "c", "d"] {
            tasks.add_at(title, None, None, now()).await.unwrap();
        }
        let id = tasks.tasks()[0].id;
        tasks.toggle_at(id, now()).await.unwrap();

        assert_eq!(tasks.active_count(), 3);
        assert_eq!(tasks.completed_count(), 1);
        assert_eq!(tasks.total_count(), 4);
        assert_eq!(tasks.progress(), 0.25);
    }

    #[tokio::test]
    async fn limit_is_advisory_in_the_store() {
        let (mut tasks, _, _) = empty(ReminderCancellation::PerTask).await;

        for i in 0..FREE_TASK_LIMIT {
            tasks.add_at(&format!("task {i}"), None, None, now()).await.unwrap();
        }

        assert!(tasks.is_over_limit(false));
        assert!(!tasks.is_over_limit(true));

        assert!(tasks.add_at("one more", None, None, now()).await.unwrap().is_some());
        assert_eq!(tasks.active_count(), FREE_TASK_LIMIT + 1);
    }

    #[tokio::test]
    async fn completed_tasks_do_not_count_against_the_limit() {
        let (mut tasks, _, _) = empty(ReminderCancellation::PerTask).await;

        for i in 0..FREE_TASK_LIMIT {
            tasks.add_at(&format!("task {i}"), None, None, now()).await.unwrap();
        }
        let id = tasks.tasks()[3].id;
        tasks.toggle_at(id, now()).await.unwrap();

        assert!(!tasks.is_over_limit(false));
    }

    #[tokio::test]
    async fn schedules_reminders_with_the_title() {
        let (mut tasks, _, notifier) = empty(ReminderCancellation::PerTask).await;
        let at = now() + Duration::days(1);

        let task = tasks
            .add_at("Call mom", Some("Personal".into()), Some(at), now())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(task.notification, Some(NotificationId("n1".into())));
        assert_eq!(task.category.as_deref(), Some("Personal"));
        let calls = notifier.calls.lock().unwrap();
        assert_eq!(calls.scheduled, vec![("Call mom".to_owned(), at)]);
    }

    #[tokio::test]
    async fn denied_reminders_still_create_the_task() {
        let store = MemoryStore::new();
        let notifier = FakeNotifier {
            deny: true,
            ..Default::default()
        };
        let mut tasks = TaskStore::load(store, notifier, ReminderCancellation::PerTask)
            .await
            .unwrap();

        let at = now() + Duration::days(1);
        let task = tasks.add_at("a", None, Some(at), now()).await.unwrap().unwrap();

        assert_eq!(task.reminder_date, Some(at));
        assert_eq!(task.notification, None);
        assert_eq!(tasks.total_count(), 1);
    }

    #[tokio::test]
    async fn per_task_cancellation_only_touches_the_task() {
        let (mut tasks, _, notifier) = empty(ReminderCancellation::PerTask).await;
        let at = now() + Duration::days(1);

        let first = tasks.add_at("a", None, Some(at), now()).await.unwrap().unwrap().id;
        let second = tasks.add_at("b", None, Some(at), now()).await.unwrap().unwrap().id;

        tasks.toggle_at(first, now()).await.unwrap();
        tasks.remove(second).await.unwrap();

        let calls = notifier.calls.lock().unwrap();
        let cancelled = vec![NotificationId("n1".into()), NotificationId("n2".into())];
        assert_eq!(calls.cancelled, cancelled);
        assert_eq!(calls.cancelled_all, 0);
        assert_eq!(tasks.get(first).unwrap().notification, None);
    }

    #[tokio::test]
    async fn cancel_all_mode_clears_everything_on_completion() {
        let (mut tasks, _, notifier) = empty(ReminderCancellation::All).await;
        let at = now() + Duration::days(1);

        let first = tasks.add_at("a", None, Some(at), now()).await.unwrap().unwrap().id;
        let second = tasks.add_at("b", None, Some(at), now()).await.unwrap().unwrap().id;
        let plain = tasks.add_at("c", None, None, now()).await.unwrap().unwrap().id;

        tasks.toggle_at(plain, now()).await.unwrap();
        assert_eq!(notifier.calls.lock().unwrap().cancelled_all, 0);

        tasks.toggle_at(first, now()).await.unwrap();
        tasks.remove(second).await.unwrap();

        let calls = notifier.calls.lock().unwrap();
        assert_eq!(calls.cancelled_all, 1);
        assert!(calls.cancelled.is_empty());
    }

    #[tokio::test]
    async fn reloads_what_was_stored() {
        let (mut tasks, store, notifier) = empty(ReminderCancellation::PerTask).await;
        tasks.add_at("a", Some("Work".into()), None, now()).await.unwrap();
        let id = tasks.add_at("b", None, None, now()).await.unwrap().unwrap().id;
        tasks.toggle_at(id, now()).await.unwrap();

        let reloaded = TaskStore::load(store, notifier, ReminderCancellation::PerTask)
            .await
            .unwrap();

        assert_eq!(reloaded.tasks(), tasks.tasks());
    }

    #[tokio::test]
    async fn corrupt_task_list_is_an_error() {
        let store = MemoryStore::new();
        store.set(TASKS_KEY, b"{not json".to_vec()).await.unwrap();

        let loaded =
            TaskStore::load(store, FakeNotifier::default(), ReminderCancellation::PerTask).await;

        assert!(loaded.is_err());
    }

    #[tokio::test]
    async fn failed_writes_keep_the_change_in_memory() {
        let mut tasks = TaskStore::load(
            ReadOnlyStore,
            FakeNotifier::default(),
            ReminderCancellation::PerTask,
        )
        .await
        .unwrap();

        assert!(tasks.add_at("a", None, None, now()).await.is_err());
        assert_eq!(tasks.total_count(), 1);
        assert_eq!(tasks.tasks()[0].title, "a");

        let id = tasks.tasks()[0].id;
        assert!(tasks.toggle_at(id, now()).await.is_err());
        assert_eq!(tasks.get(id).unwrap().completed_at(), Some(now()));
    }

    #[test]
    fn premium_hides_tasks_completed_before_today() {
        let today = now().date_naive();

        let active = Task::new("active", now() - Duration::days(3));
        let mut yesterday = Task::new("yesterday", now() - Duration::days(2));
        yesterday.status = TaskStatus::Completed {
            at: now() - Duration::days(1),
        };
        let mut this_morning = Task::new("today", now() - Duration::days(2));
        this_morning.status = TaskStatus::Completed {
            at: now() - Duration::hours(4),
        };
        let tasks = vec![active, yesterday, this_morning];

        let premium: Vec<_> = visible_for_premium_auto_hide(&tasks, true, today)
            .into_iter()
            .map(|task| task.title.as_str())
            .collect();
        assert_eq!(premium, ["active", "today"]);

        assert_eq!(visible_for_premium_auto_hide(&tasks, false, today).len(), 3);
    }
}
