//! Scheduled reminder jobs (`cron-appointments`, `cron-contracts`, `cron-quotes`).
//!
//! Called by the scheduler without a user token. Each run scans for due
//! records and writes one notification per record; a failed write fails the
//! run, and the next scheduled call picks the work up again.

use std::sync::Arc;

use async_trait::async_trait;
use axum::response::{IntoResponse, Json, Response};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use crate::config::{ConfigError, ReminderConfig};
use crate::dispatch::{EndpointContext, EndpointHandler, HandlerError};
use crate::store::{NewNotification, NotificationStore, ReminderCandidate, ReminderKind};

pub struct ReminderJob {
    kind: ReminderKind,
    window: Duration,
    store: Arc<dyn NotificationStore>,
}

impl ReminderJob {
    pub fn appointments(store: Arc<dyn NotificationStore>, config: &ReminderConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            kind: ReminderKind::Appointment,
            window: config.appointment_window()?,
            store,
        })
    }

    pub fn contracts(store: Arc<dyn NotificationStore>, config: &ReminderConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            kind: ReminderKind::Contract,
            window: config.contract_window()?,
            store,
        })
    }

    pub fn quotes(store: Arc<dyn NotificationStore>, config: &ReminderConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            kind: ReminderKind::Quote,
            window: config.quote_followup()?,
            store,
        })
    }

    /// Appointments and contracts look ahead; quotes look back for ones left pending
    fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.kind {
            ReminderKind::Quote => now - self.window,
            ReminderKind::Appointment | ReminderKind::Contract => now + self.window,
        }
    }
}

fn reminder_for(kind: ReminderKind, candidate: &ReminderCandidate) -> NewNotification {
    let due = candidate.due_at.format("%Y-%m-%d %H:%M UTC");
    let (title, message) = match kind {
        ReminderKind::Appointment => (
            "Upcoming appointment".to_string(),
            format!("{} is scheduled for {}", candidate.title, due),
        ),
        ReminderKind::Contract => (
            "Contract expiring soon".to_string(),
            format!("{} expires on {}", candidate.title, due),
        ),
        ReminderKind::Quote => (
            "Quote awaiting response".to_string(),
            format!("{} has been pending since {}", candidate.title, due),
        ),
    };

    NewNotification {
        user_id: candidate.user_id.clone(),
        kind: kind.notification_kind().to_string(),
        title,
        message,
        data: json!({
            "record_id": candidate.record_id,
            "due_at": candidate.due_at,
        }),
    }
}

#[async_trait]
impl EndpointHandler for ReminderJob {
    fn methods(&self) -> &'static [&'static str] {
        &["GET", "POST"]
    }

    async fn handle(&self, ctx: EndpointContext) -> Result<Response, HandlerError> {
        let cutoff = self.cutoff(Utc::now());
        let candidates = self.store.due_reminders(self.kind, cutoff).await?;

        for candidate in &candidates {
            self.store.create_notification(reminder_for(self.kind, candidate)).await?;
        }

        tracing::info!(job = %ctx.endpoint, processed = candidates.len(), "reminder job finished");

        Ok(Json(json!({
            "job": ctx.endpoint,
            "processed": candidates.len(),
        }))
        .into_response())
    }
}
