//! The state a UI talks to: one task store and one entitlement manager,
//! built once at start-up and handed out by reference.

use std::collections::BTreeMap;

use checkdone_api::v1::{DayMarker, Entitlement, PremiumWindow, Task};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use crate::{
    calendar,
    config::Config,
    entitlement::{Entitlements, PromoOutcome},
    notify::{LocalNotifier, Notifier},
    persist::{FileStore, KeyValueStore},
    tasks::{self, ReminderCancellation, TaskStore},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    Added(Uuid),
    EmptyTitle,
    /// The free tier already has its maximum of active tasks.
    LimitReached,
    /// The target day is before today.
    PastDay,
}

#[derive(Debug)]
pub struct App<S, N> {
    tasks: TaskStore<S, N>,
    premium: Entitlements<S>,
}

impl App<FileStore, LocalNotifier> {
    /// Open the file backed state described by `config`.
    pub async fn open(config: &Config) -> eyre::Result<Self> {
        let store = FileStore::new(&config.data_dir);
        let notifier = LocalNotifier::new(&config.reminder_title);

        Self::load(store, notifier, config.reminder_cancellation).await
    }
}

impl<S, N> App<S, N>
where
    S: KeyValueStore + Clone,
    N: Notifier,
{
    pub async fn load(
        store: S,
        notifier: N,
        cancellation: ReminderCancellation,
    ) -> eyre::Result<Self> {
        Self::load_at(store, notifier, cancellation, Utc::now()).await
    }

    pub async fn load_at(
        store: S,
        notifier: N,
        cancellation: ReminderCancellation,
        now: DateTime<Utc>,
    ) -> eyre::Result<Self> {
        let premium = Entitlements::load_at(store.clone(), now).await?;
        let tasks = TaskStore::load(store, notifier, cancellation).await?;

        Ok(Self { tasks, premium })
    }

    pub fn tasks(&self) -> &TaskStore<S, N> {
        &self.tasks
    }

    pub fn entitlement(&self) -> Entitlement {
        self.premium.entitlement()
    }

    pub fn is_premium(&self) -> bool {
        self.premium.is_premium()
    }

    pub fn is_over_limit(&self) -> bool {
        self.tasks.is_over_limit(self.is_premium())
    }

    pub async fn add_task(
        &mut self,
        title: &str,
        category: Option<String>,
        reminder: Option<DateTime<Utc>>,
    ) -> eyre::Result<AddOutcome> {
        self.add_task_at(title, category, reminder, Utc::now()).await
    }

    pub async fn add_task_at(
        &mut self,
        title: &str,
        category: Option<String>,
        reminder: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> eyre::Result<AddOutcome> {
        if title.trim().is_empty() {
            return Ok(AddOutcome::EmptyTitle);
        }

        if self.is_over_limit() {
            info!(active = self.tasks.active_count(), "task limit reached");
            return Ok(AddOutcome::LimitReached);
        }

        let added = self.tasks.add_at(title, category, reminder, now).await?;

        Ok(match added {
            Some(task) => AddOutcome::Added(task.id),
            None => AddOutcome::EmptyTitle,
        })
    }

    /// Add a task from the calendar view for `day`.
    pub async fn add_task_on(
        &mut self,
        day: NaiveDate,
        title: &str,
        category: Option<String>,
        reminder: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> eyre::Result<AddOutcome> {
        if !calendar::can_add_on(day, now.date_naive()) {
            return Ok(AddOutcome::PastDay);
        }

        self.add_task_at(title, category, reminder, now).await
    }

    pub async fn toggle_task(&mut self, id: Uuid) -> eyre::Result<Option<&Task>> {
        self.toggle_task_at(id, Utc::now()).await
    }

    pub async fn toggle_task_at(
        &mut self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> eyre::Result<Option<&Task>> {
        self.tasks.toggle_at(id, now).await
    }

    pub async fn remove_task(&mut self, id: Uuid) -> eyre::Result<Option<Task>> {
        self.tasks.remove(id).await
    }

    /// The main list, with old completed tasks hidden for premium users.
    pub fn visible_tasks(&self, today: NaiveDate) -> Vec<&Task> {
        tasks::visible_for_premium_auto_hide(self.tasks.tasks(), self.is_premium(), today)
    }

    pub fn day_markers(&self) -> BTreeMap<NaiveDate, DayMarker> {
        calendar::day_markers(self.tasks.tasks())
    }

    pub fn tasks_on(&self, day: NaiveDate) -> Vec<&Task> {
        calendar::tasks_on(self.tasks.tasks(), day)
    }

    pub fn can_browse_month(&self, today: NaiveDate, month: NaiveDate) -> bool {
        calendar::can_browse_month(self.is_premium(), today, month)
    }

    pub fn premium_window(&self, now: DateTime<Utc>) -> Option<PremiumWindow> {
        self.premium.window_at(now)
    }

    pub async fn upgrade(&mut self) -> eyre::Result<Entitlement> {
        self.premium.upgrade().await
    }

    pub async fn redeem_promo_code(&mut self, code: &str) -> eyre::Result<PromoOutcome> {
        self.premium.redeem_promo_code(code).await
    }

    pub async fn reset_premium(&mut self) -> eyre::Result<()> {
        self.premium.reset().await
    }
}
