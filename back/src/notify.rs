use std::{collections::HashMap, future::Future};

use checkdone_api::v1::NotificationId;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Binding to the platform's local notification service.
pub trait Notifier {
    /// Request a one-shot notification showing `body` at `at`.
    fn schedule(
        &self,
        body: &str,
        at: DateTime<Utc>,
    ) -> impl Future<Output = eyre::Result<NotificationId>> + Send;

    fn cancel(&self, id: &NotificationId) -> impl Future<Output = eyre::Result<()>> + Send;

    /// Cancel every pending notification of the process.
    fn cancel_all(&self) -> impl Future<Output = eyre::Result<()>> + Send;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    Undetermined,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reminder {
    pub id: NotificationId,
    pub title: String,
    pub body: String,
    pub at: DateTime<Utc>,
}

/// Notification binding that keeps pending reminders in memory, for hosts
/// without a platform scheduler of their own.
#[derive(Debug)]
pub struct LocalNotifier {
    title: String,
    permission: Mutex<Permission>,
    pending: Mutex<HashMap<NotificationId, Reminder>>,
}

impl LocalNotifier {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            permission: Mutex::new(Permission::Granted),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub async fn permission(&self) -> Permission {
        *self.permission.lock().await
    }

    pub async fn set_permission(&self, permission: Permission) {
        *self.permission.lock().await = permission;
    }

    /// Pending reminders, soonest first.
    pub async fn pending(&self) -> Vec<Reminder> {
        let pending = self.pending.lock().await;
        let mut reminders: Vec<_> = pending.values().cloned().collect();
        reminders.sort_by_key(|reminder| reminder.at);
        reminders
    }

    /// Remove and return the reminders due at `now`.
    pub async fn take_due(&self, now: DateTime<Utc>) -> Vec<Reminder> {
        let mut pending = self.pending.lock().await;

        let due: Vec<_> = (pending.values())
            .filter(|reminder| reminder.at <= now)
            .map(|reminder| reminder.id.clone())
            .collect();

        let mut fired: Vec<_> = (due.iter())
            .filter_map(|id| pending.remove(id))
            .collect();
        fired.sort_by_key(|reminder| reminder.at);
        fired
    }
}

impl Notifier for LocalNotifier {
    async fn schedule(&self, body: &str, at: DateTime<Utc>) -> eyre::Result<NotificationId> {
        let permission = self.permission().await;
        if permission != Permission::Granted {
            eyre::bail!("notification permission is {:?}", permission);
        }

        if at <= Utc::now() {
            eyre::bail!("reminder time {} is not in the future", at);
        }

        let id = NotificationId(Uuid::new_v4().to_string());
        let reminder = Reminder {
            id: id.clone(),
            title: self.title.clone(),
            body: body.to_owned(),
            at,
        };

        self.pending.lock().await.insert(id.clone(), reminder);

        debug!(%id, %at, "scheduled reminder");

        Ok(id)
    }

    async fn cancel(&self, id: &NotificationId) -> eyre::Result<()> {
        self.pending.lock().await.remove(id);
        Ok(())
    }

    async fn cancel_all(&self) -> eyre::Result<()> {
        self.pending.lock().await.clear();
        Ok(())
    }
}
