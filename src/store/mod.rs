//! Passthrough persistence for notifications and the records the reminder
//! jobs scan. Rows are owned by the backing store; this crate only shapes
//! requests and forwards them.

pub mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store answered, but refused the request
    #[error("{0}")]
    Rejected(String),
    #[error("store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed store response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNotification {
    pub user_id: String,
    pub kind: String,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListQuery {
    pub unread_only: bool,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechLocation {
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReminderKind {
    Appointment,
    Contract,
    Quote,
}

impl ReminderKind {
    /// Notification kind written for reminders of this type
    pub fn notification_kind(self) -> &'static str {
        match self {
            ReminderKind::Appointment => "appointment_reminder",
            ReminderKind::Contract => "contract_expiring",
            ReminderKind::Quote => "quote_followup",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            ReminderKind::Appointment => "appointments",
            ReminderKind::Contract => "contracts",
            ReminderKind::Quote => "quotes",
        }
    }
}

/// A record that a reminder job should notify someone about
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderCandidate {
    pub record_id: String,
    pub user_id: String,
    pub title: String,
    pub due_at: DateTime<Utc>,
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn list_notifications(&self, user_id: &str, query: ListQuery) -> Result<Vec<Notification>, StoreError>;

    async fn create_notification(&self, new: NewNotification) -> Result<Notification, StoreError>;

    /// Mark the given notifications (or all of them when `ids` is `None`) read.
    /// Returns how many rows changed.
    async fn mark_read(&self, user_id: &str, ids: Option<Vec<String>>) -> Result<usize, StoreError>;

    async fn get_preferences(&self, user_id: &str) -> Result<Option<Value>, StoreError>;

    async fn put_preferences(&self, user_id: &str, preferences: Value) -> Result<Value, StoreError>;

    async fn record_tech_location(&self, location: TechLocation) -> Result<TechLocation, StoreError>;

    async fn latest_tech_location(&self, user_id: &str) -> Result<Option<TechLocation>, StoreError>;

    /// Records of `kind` whose due date falls between now and `cutoff`
    /// (or, for quotes, that have been pending since before `cutoff`).
    async fn due_reminders(&self, kind: ReminderKind, cutoff: DateTime<Utc>) -> Result<Vec<ReminderCandidate>, StoreError>;
}
