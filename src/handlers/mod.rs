// handlers/mod.rs - endpoint handlers and the route table that names them
//
// Two access tiers plus one exception:
// cron (no auth) → authenticated (bearer token) → webhook (signature instead of token)

pub mod cron;
pub mod notifications;
pub mod webhook;

use std::sync::Arc;

use crate::config::ReminderConfig;
use crate::dispatch::RouteTable;
use crate::payments::PaymentProcessor;
use crate::store::NotificationStore;

use cron::ReminderJob;
use notifications::{MarkRead, NotificationFeed, Notifications, Preferences, TechLocationUpdates};
use webhook::StripeWebhook;

/// Build the notification API route table
pub fn route_table(
    store: Arc<dyn NotificationStore>,
    payments: Arc<dyn PaymentProcessor>,
    reminders: &ReminderConfig,
) -> anyhow::Result<RouteTable> {
    let table = RouteTable::builder()
        // System-triggered
        .cron("cron-appointments", ReminderJob::appointments(store.clone(), reminders)?)
        .cron("cron-contracts", ReminderJob::contracts(store.clone(), reminders)?)
        .cron("cron-quotes", ReminderJob::quotes(store.clone(), reminders)?)
        // Stripe authenticates with its own signature
        .alternate_auth("webhook", StripeWebhook::new(payments, store.clone()))
        // User-facing
        .authenticated("notifications", Notifications::new(store.clone()))
        .authenticated("mark-read", MarkRead::new(store.clone()))
        .authenticated("preferences", Preferences::new(store.clone()))
        .authenticated("tech-location", TechLocationUpdates::new(store.clone()))
        .fallback(NotificationFeed::new(store))
        .build()?;
    Ok(table)
}
