use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    ListQuery, NewNotification, Notification, NotificationStore, ReminderCandidate, ReminderKind,
    StoreError, TechLocation,
};
use crate::auth::{IdentityStore, Profile, User};

/// In-process store backing local development (`STORE_BACKEND=memory`) and tests.
///
/// Tokens are registered up front with [`MemoryStore::add_user`]; anything
/// else is rejected the way Supabase rejects an unknown JWT.
#[derive(Default)]
pub struct MemoryStore {
    tokens: RwLock<HashMap<String, User>>,
    profiles: RwLock<HashMap<String, Profile>>,
    notifications: RwLock<Vec<Notification>>,
    preferences: RwLock<HashMap<String, Value>>,
    locations: RwLock<HashMap<String, TechLocation>>,
    reminders: RwLock<HashMap<ReminderKind, Vec<ReminderCandidate>>>,
    identity_lookups: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, token: &str, user: User, profile: Option<Profile>) {
        if let Some(profile) = profile {
            self.profiles.write().await.insert(user.id.clone(), profile);
        }
        self.tokens.write().await.insert(token.to_string(), user);
    }

    pub async fn add_reminder(&self, kind: ReminderKind, candidate: ReminderCandidate) {
        self.reminders.write().await.entry(kind).or_default().push(candidate);
    }

    /// Number of identity store calls (token + profile) served so far
    pub fn identity_lookups(&self) -> usize {
        self.identity_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn resolve_token(&self, token: &str) -> Result<User, StoreError> {
        self.identity_lookups.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or_else(|| StoreError::Rejected("invalid JWT: unable to parse or verify signature".to_string()))
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError> {
        self.identity_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.profiles.read().await.get(user_id).cloned())
    }
}

#[async_trait]
impl NotificationStore for MemoryStore {
    async fn list_notifications(&self, user_id: &str, query: ListQuery) -> Result<Vec<Notification>, StoreError> {
        let notifications = self.notifications.read().await;
        let mut rows: Vec<Notification> = notifications
            .iter()
            .filter(|n| n.user_id == user_id && !(query.unread_only && n.read))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn create_notification(&self, new: NewNotification) -> Result<Notification, StoreError> {
        let notification = Notification {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id,
            kind: new.kind,
            title: new.title,
            message: new.message,
            data: new.data,
            read: false,
            created_at: Utc::now(),
        };
        self.notifications.write().await.push(notification.clone());
        Ok(notification)
    }

    async fn mark_read(&self, user_id: &str, ids: Option<Vec<String>>) -> Result<usize, StoreError> {
        let mut notifications = self.notifications.write().await;
        let mut changed = 0;
        for n in notifications.iter_mut().filter(|n| n.user_id == user_id && !n.read) {
            let selected = ids.as_ref().map_or(true, |ids| ids.contains(&n.id));
            if selected {
                n.read = true;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn get_preferences(&self, user_id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.preferences.read().await.get(user_id).cloned())
    }

    async fn put_preferences(&self, user_id: &str, preferences: Value) -> Result<Value, StoreError> {
        self.preferences
            .write()
            .await
            .insert(user_id.to_string(), preferences.clone());
        Ok(preferences)
    }

    async fn record_tech_location(&self, location: TechLocation) -> Result<TechLocation, StoreError> {
        self.locations
            .write()
            .await
            .insert(location.user_id.clone(), location.clone());
        Ok(location)
    }

    async fn latest_tech_location(&self, user_id: &str) -> Result<Option<TechLocation>, StoreError> {
        Ok(self.locations.read().await.get(user_id).cloned())
    }

    async fn due_reminders(&self, kind: ReminderKind, cutoff: DateTime<Utc>) -> Result<Vec<ReminderCandidate>, StoreError> {
        let now = Utc::now();
        let reminders = self.reminders.read().await;
        let due = reminders
            .get(&kind)
            .map(|candidates| {
                candidates
                    .iter()
                    .filter(|c| match kind {
                        ReminderKind::Quote => c.due_at <= cutoff,
                        ReminderKind::Appointment | ReminderKind::Contract => c.due_at >= now && c.due_at <= cutoff,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(due)
    }
}
