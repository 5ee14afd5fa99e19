//! Router assembly and startup wiring.
//!
//! Clients are constructed here once and injected; nothing below reaches for
//! a global client.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{any, get},
    Router,
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::auth::{IdentityStore, TokenVerifier};
use crate::clients::SupabaseClient;
use crate::config::{AppConfig, StoreBackend};
use crate::dispatch::Dispatcher;
use crate::handlers;
use crate::middleware::{cors_middleware, CorsPolicy};
use crate::payments::{PaymentProcessor, StripeWebhookProcessor};
use crate::store::{MemoryStore, NotificationStore};

/// External collaborators, chosen by configuration
#[derive(Clone)]
pub struct Backends {
    pub identity: Arc<dyn IdentityStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub payments: Arc<dyn PaymentProcessor>,
}

impl Backends {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let payments: Arc<dyn PaymentProcessor> = Arc::new(StripeWebhookProcessor::new(&config.stripe));

        match config.store.backend {
            StoreBackend::Supabase => {
                let client = Arc::new(SupabaseClient::new(&config.supabase)?);
                Ok(Self {
                    identity: client.clone(),
                    notifications: client,
                    payments,
                })
            }
            StoreBackend::Memory => {
                tracing::warn!("using in-memory store; data is lost on restart");
                let store = Arc::new(MemoryStore::new());
                Ok(Self {
                    identity: store.clone(),
                    notifications: store,
                    payments,
                })
            }
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub cors: CorsPolicy,
    pub route_prefix: String,
    pub max_request_size_bytes: usize,
}

impl AppState {
    pub fn new(config: &AppConfig, backends: Backends) -> anyhow::Result<Self> {
        let routes = handlers::route_table(backends.notifications, backends.payments, &config.reminders)?;
        let verifier = TokenVerifier::new(backends.identity);

        Ok(Self {
            dispatcher: Arc::new(Dispatcher::new(verifier, routes)),
            cors: CorsPolicy::from_config(&config.cors)?,
            route_prefix: config.server.route_prefix.trim_end_matches('/').to_string(),
            max_request_size_bytes: config.server.max_request_size_bytes,
        })
    }
}

pub fn app(state: AppState) -> Router {
    let prefix = state.route_prefix.clone();
    let cors = state.cors.clone();
    let body_limit = state.max_request_size_bytes;

    Router::new()
        .route("/health", get(health))
        // Notification API: every endpoint name goes through the dispatcher
        .route(&prefix, any(dispatch))
        .route(&format!("{}/*endpoint", prefix), any(dispatch))
        .fallback(not_found)
        .with_state(state)
        // Global middleware; CORS wraps everything, fallback included
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(cors, cors_middleware))
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Hey Spruce API listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn dispatch(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.dispatcher.dispatch(method, &uri, headers, body).await
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}
