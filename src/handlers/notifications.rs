//! User-facing notification endpoints. All of them run behind the token
//! verifier and only touch the caller's own rows unless the caller is an admin.

use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::dispatch::{Caller, EndpointContext, EndpointHandler, HandlerError};
use crate::error::ApiError;
use crate::store::{ListQuery, NewNotification, NotificationStore, TechLocation};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 200;

fn is_admin(caller: &Caller) -> bool {
    caller.role.as_deref() == Some("admin")
}

fn list_query(ctx: &EndpointContext) -> Result<ListQuery, HandlerError> {
    let unread_only = matches!(ctx.query_param("unread_only").as_deref(), Some("true") | Some("1"));
    let limit = match ctx.query_param("limit") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| ApiError::bad_request(format!("Invalid limit '{}'", raw)))?,
        None => DEFAULT_LIMIT,
    };

    Ok(ListQuery {
        unread_only,
        limit: Some(limit.min(MAX_LIMIT)),
    })
}

async fn list_for(store: &dyn NotificationStore, ctx: &EndpointContext) -> Result<Response, HandlerError> {
    let caller = ctx.caller()?;
    let notifications = store.list_notifications(&caller.user_id, list_query(ctx)?).await?;
    let unread = notifications.iter().filter(|n| !n.read).count();

    Ok(Json(json!({
        "notifications": notifications,
        "count": notifications.len(),
        "unread": unread,
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
struct CreateNotificationRequest {
    user_id: Option<String>,
    kind: Option<String>,
    title: String,
    message: String,
    #[serde(default)]
    data: Value,
}

/// `notifications`: GET lists the caller's notifications, POST creates one
pub struct Notifications {
    store: Arc<dyn NotificationStore>,
}

impl Notifications {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EndpointHandler for Notifications {
    fn methods(&self) -> &'static [&'static str] {
        &["GET", "POST"]
    }

    async fn handle(&self, ctx: EndpointContext) -> Result<Response, HandlerError> {
        if ctx.method == Method::GET {
            return list_for(self.store.as_ref(), &ctx).await;
        }

        let caller = ctx.caller()?;
        let req: CreateNotificationRequest = ctx.json()?;

        let user_id = req.user_id.unwrap_or_else(|| caller.user_id.clone());
        if user_id != caller.user_id && !is_admin(caller) {
            return Err(ApiError::forbidden("Only admins can notify other users").into());
        }
        if req.title.trim().is_empty() {
            return Err(ApiError::bad_request("title must not be empty").into());
        }

        let notification = self
            .store
            .create_notification(NewNotification {
                user_id,
                kind: req.kind.unwrap_or_else(|| "general".to_string()),
                title: req.title,
                message: req.message,
                data: req.data,
            })
            .await?;

        Ok((StatusCode::CREATED, Json(json!({ "notification": notification }))).into_response())
    }
}

/// Catch-all for unrecognized endpoint names: the caller's notification list,
/// whatever the method
pub struct NotificationFeed {
    store: Arc<dyn NotificationStore>,
}

impl NotificationFeed {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EndpointHandler for NotificationFeed {
    fn methods(&self) -> &'static [&'static str] {
        &[]
    }

    async fn handle(&self, ctx: EndpointContext) -> Result<Response, HandlerError> {
        list_for(self.store.as_ref(), &ctx).await
    }
}

#[derive(Debug, Default, Deserialize)]
struct MarkReadRequest {
    ids: Option<Vec<String>>,
}

/// `mark-read`: marks the listed ids, or everything when no ids are given
pub struct MarkRead {
    store: Arc<dyn NotificationStore>,
}

impl MarkRead {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EndpointHandler for MarkRead {
    fn methods(&self) -> &'static [&'static str] {
        &["POST", "PUT"]
    }

    async fn handle(&self, ctx: EndpointContext) -> Result<Response, HandlerError> {
        let caller = ctx.caller()?;
        let req: MarkReadRequest = ctx.json_or_default()?;
        let updated = self.store.mark_read(&caller.user_id, req.ids).await?;

        Ok(Json(json!({ "updated": updated })).into_response())
    }
}

/// `preferences`: per-user notification settings, stored as an opaque object
pub struct Preferences {
    store: Arc<dyn NotificationStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EndpointHandler for Preferences {
    fn methods(&self) -> &'static [&'static str] {
        &["GET", "PUT", "POST"]
    }

    async fn handle(&self, ctx: EndpointContext) -> Result<Response, HandlerError> {
        let caller = ctx.caller()?;

        if ctx.method == Method::GET {
            let preferences = self
                .store
                .get_preferences(&caller.user_id)
                .await?
                .unwrap_or_else(|| json!({}));
            return Ok(Json(json!({ "preferences": preferences })).into_response());
        }

        let preferences: Value = ctx.json()?;
        if !preferences.is_object() {
            return Err(ApiError::bad_request("preferences must be a JSON object").into());
        }

        let saved = self.store.put_preferences(&caller.user_id, preferences).await?;
        Ok(Json(json!({ "preferences": saved })).into_response())
    }
}

#[derive(Debug, Deserialize)]
struct LocationUpdate {
    latitude: f64,
    longitude: f64,
    accuracy: Option<f64>,
}

/// `tech-location`: technicians report their position; anyone can read their own
pub struct TechLocationUpdates {
    store: Arc<dyn NotificationStore>,
}

impl TechLocationUpdates {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EndpointHandler for TechLocationUpdates {
    fn methods(&self) -> &'static [&'static str] {
        &["GET", "POST"]
    }

    async fn handle(&self, ctx: EndpointContext) -> Result<Response, HandlerError> {
        let caller = ctx.caller()?;

        if ctx.method == Method::GET {
            let location = self.store.latest_tech_location(&caller.user_id).await?;
            return Ok(Json(json!({ "user_id": caller.user_id, "location": location })).into_response());
        }

        // a missing profile means no role, which is not "tech"
        if caller.role.as_deref() != Some("tech") {
            return Err(ApiError::forbidden("Only technicians can report a location").into());
        }

        let update: LocationUpdate = ctx.json()?;
        if !(-90.0..=90.0).contains(&update.latitude) || !(-180.0..=180.0).contains(&update.longitude) {
            return Err(ApiError::bad_request("latitude/longitude out of range").into());
        }

        let location = self
            .store
            .record_tech_location(TechLocation {
                user_id: caller.user_id.clone(),
                latitude: update.latitude,
                longitude: update.longitude,
                accuracy: update.accuracy,
                recorded_at: Utc::now(),
            })
            .await?;

        Ok((StatusCode::CREATED, Json(json!({ "location": location }))).into_response())
    }
}
