#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use heyspruce_api::{
    auth::{Profile, TokenVerifier, User},
    config::{AppConfig, StoreBackend},
    dispatch::{Dispatcher, RouteTable},
    middleware::CorsPolicy,
    payments::{PaymentProcessor, StripeWebhookProcessor},
    server::{self, AppState, Backends},
    store::MemoryStore,
};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tower::ServiceExt;

pub const PREFIX: &str = "/api/notifications-enhanced";
pub const WEBHOOK_SECRET: &str = "whsec_integration_secret";

pub const TECH_TOKEN: &str = "tech-token";
pub const TECH_ID: &str = "tech-1";
pub const CLIENT_TOKEN: &str = "client-token";
pub const CLIENT_ID: &str = "client-1";
pub const ADMIN_TOKEN: &str = "admin-token";
pub const ADMIN_ID: &str = "admin-1";
/// Valid token whose user has no profile row
pub const BARE_TOKEN: &str = "bare-token";
pub const BARE_ID: &str = "bare-1";

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.store.backend = StoreBackend::Memory;
    config.stripe.webhook_secret = WEBHOOK_SECRET.to_string();
    config
}

fn profile(role: &str) -> Profile {
    serde_json::from_value(json!({ "role": role, "full_name": format!("Test {}", role) }))
        .expect("profile fixture")
}

/// Memory store with one user per role
pub async fn seeded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let user = |id: &str, email: &str| User {
        id: id.to_string(),
        email: Some(email.to_string()),
    };

    store.add_user(TECH_TOKEN, user(TECH_ID, "tech@heyspruce.test"), Some(profile("tech"))).await;
    store.add_user(CLIENT_TOKEN, user(CLIENT_ID, "client@heyspruce.test"), Some(profile("client"))).await;
    store.add_user(ADMIN_TOKEN, user(ADMIN_ID, "admin@heyspruce.test"), Some(profile("admin"))).await;
    store.add_user(BARE_TOKEN, user(BARE_ID, "bare@heyspruce.test"), None).await;
    store
}

pub fn backends(store: Arc<MemoryStore>) -> Backends {
    let config = test_config();
    let payments: Arc<dyn PaymentProcessor> = Arc::new(StripeWebhookProcessor::new(&config.stripe));
    Backends {
        identity: store.clone(),
        notifications: store,
        payments,
    }
}

/// Full application router over `store`
pub fn test_app(store: Arc<MemoryStore>) -> Result<Router> {
    let state = AppState::new(&test_config(), backends(store))?;
    Ok(server::app(state))
}

/// Application router serving a hand-built route table in place of the real one
pub fn app_with_routes(store: Arc<MemoryStore>, routes: RouteTable) -> Result<Router> {
    let config = test_config();
    let state = AppState {
        dispatcher: Arc::new(Dispatcher::new(TokenVerifier::new(store), routes)),
        cors: CorsPolicy::from_config(&config.cors)?,
        route_prefix: PREFIX.to_string(),
        max_request_size_bytes: config.server.max_request_size_bytes,
    };
    Ok(server::app(state))
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub raw: Vec<u8>,
    pub body: Value,
}

/// Drive one request through `app` without a socket
pub async fn send(app: Router, request: Request<Body>) -> Result<TestResponse> {
    let response = app.oneshot(request).await.context("request execution")?;
    let status = response.status();
    let headers = response.headers().clone();
    let raw = to_bytes(response.into_body(), usize::MAX).await?.to_vec();
    let body = if raw.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&raw).context("json body")?
    };
    Ok(TestResponse { status, headers, raw, body })
}

pub fn endpoint(name: &str) -> String {
    format!("{}/{}", PREFIX, name)
}

/// Server bound to an ephemeral port for the lifetime of one test
pub struct TestServer {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        let store = seeded_store().await;
        let app = test_app(store.clone())?;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let base_url = format!("http://{}", listener.local_addr()?);
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { base_url, store, handle })
    }

    pub fn url(&self, name: &str) -> String {
        format!("{}{}", self.base_url, endpoint(name))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
