pub mod app;
pub mod calendar;
pub mod config;
pub mod entitlement;
pub mod notify;
pub mod persist;
pub mod tasks;

pub use app::{AddOutcome, App};
pub use config::Config;
pub use entitlement::{Entitlements, PromoOutcome};
pub use notify::{LocalNotifier, Notifier};
pub use persist::{FileStore, KeyValueStore, MemoryStore};
pub use tasks::{ReminderCancellation, TaskStore};
