//! `webhook`: Stripe event receiver.
//!
//! Reaches the handler whether or not a bearer token verified; the
//! `stripe-signature` header is the authentication here.

use std::sync::Arc;

use async_trait::async_trait;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::dispatch::{EndpointContext, EndpointHandler, HandlerError};
use crate::error::ApiError;
use crate::payments::{PaymentProcessor, WebhookEvent};
use crate::store::{NewNotification, NotificationStore};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

pub struct StripeWebhook {
    payments: Arc<dyn PaymentProcessor>,
    store: Arc<dyn NotificationStore>,
}

impl StripeWebhook {
    pub fn new(payments: Arc<dyn PaymentProcessor>, store: Arc<dyn NotificationStore>) -> Self {
        Self { payments, store }
    }
}

/// Notification to send the payer for events they care about
fn payment_notification(event: &WebhookEvent) -> Option<NewNotification> {
    let user_id = event.user_id()?;
    let amount = event
        .amount()
        .map(|cents| format!(" of ${}.{:02}", cents / 100, cents % 100))
        .unwrap_or_default();

    let (kind, title, message) = match event.event_type.as_str() {
        "payment_intent.succeeded" => (
            "payment_succeeded",
            "Payment received",
            format!("Your payment{} was processed successfully", amount),
        ),
        "payment_intent.payment_failed" => (
            "payment_failed",
            "Payment failed",
            format!("Your payment{} could not be processed", amount),
        ),
        _ => return None,
    };

    Some(NewNotification {
        user_id: user_id.to_string(),
        kind: kind.to_string(),
        title: title.to_string(),
        message,
        data: json!({ "stripe_event_id": event.id }),
    })
}

#[async_trait]
impl EndpointHandler for StripeWebhook {
    fn methods(&self) -> &'static [&'static str] {
        &["POST"]
    }

    async fn handle(&self, ctx: EndpointContext) -> Result<Response, HandlerError> {
        let event = match self
            .payments
            .process_webhook(&ctx.body, ctx.header(SIGNATURE_HEADER))
            .await
        {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "rejecting webhook");
                return Err(ApiError::bad_request(format!("Webhook Error: {}", e)).into());
            }
        };

        tracing::info!(event_id = %event.id, event_type = %event.event_type, "stripe event received");

        if let Some(notification) = payment_notification(&event) {
            self.store.create_notification(notification).await?;
        }

        Ok(Json(json!({ "received": true, "event": event.event_type })).into_response())
    }
}
