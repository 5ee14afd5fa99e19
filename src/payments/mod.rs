//! Stripe webhook intake.
//!
//! Webhook calls carry no user token; they authenticate with the
//! `stripe-signature` header instead, checked here before the event is parsed.

pub mod signature;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::StripeConfig;
use signature::SignatureError;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),
}

/// The parts of a Stripe event this service looks at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: EventData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    #[serde(default)]
    pub object: Value,
}

impl WebhookEvent {
    /// `metadata.user_id` of the event object, set by the app when it creates
    /// the payment intent
    pub fn user_id(&self) -> Option<&str> {
        self.data.object.pointer("/metadata/user_id").and_then(Value::as_str)
    }

    /// Amount in minor units, when the object has one
    pub fn amount(&self) -> Option<i64> {
        self.data.object.get("amount").and_then(Value::as_i64)
    }
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn process_webhook(&self, payload: &[u8], signature: Option<&str>) -> Result<WebhookEvent, PaymentError>;
}

pub struct StripeWebhookProcessor {
    webhook_secret: String,
    tolerance_secs: i64,
}

impl StripeWebhookProcessor {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            webhook_secret: config.webhook_secret.clone(),
            tolerance_secs: config.signature_tolerance_secs,
        }
    }
}

#[async_trait]
impl PaymentProcessor for StripeWebhookProcessor {
    async fn process_webhook(&self, payload: &[u8], signature: Option<&str>) -> Result<WebhookEvent, PaymentError> {
        signature::verify(
            payload,
            signature,
            &self.webhook_secret,
            self.tolerance_secs,
            chrono::Utc::now().timestamp(),
        )?;

        serde_json::from_slice(payload).map_err(|e| PaymentError::InvalidPayload(e.to_string()))
    }
}
