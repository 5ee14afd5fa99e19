//! Endpoint dispatcher for the notification API.
//!
//! Every request under the API prefix lands here. The endpoint name is the
//! last path segment; the route table decides whether the token verifier
//! runs, and a single boundary turns handler failures into 500 responses.

mod routes;

pub use routes::{Access, Route, RouteTable, RouteTableBuilder, RouteTableError};

use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::auth::{AuthError, Identity, TokenVerifier};
use crate::error::ApiError;
use crate::store::StoreError;

/// Authenticated caller as handlers see it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub role: Option<String>,
}

impl From<&Identity> for Caller {
    fn from(identity: &Identity) -> Self {
        Self {
            user_id: identity.id.clone(),
            role: identity.role().map(str::to_string),
        }
    }
}

/// Everything a handler gets to see of the request
#[derive(Debug, Clone)]
pub struct EndpointContext {
    pub endpoint: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub query: Option<String>,
    pub body: Bytes,
    pub caller: Option<Caller>,
}

impl EndpointContext {
    /// The authenticated caller; only absent on cron and alternate-auth routes
    pub fn caller(&self) -> Result<&Caller, HandlerError> {
        self.caller
            .as_ref()
            .ok_or_else(|| ApiError::from(AuthError::MissingToken).into())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn query_param(&self, key: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Decode the JSON body; an empty body decodes as `T::default()`
    pub fn json_or_default<T: DeserializeOwned + Default>(&self) -> Result<T, HandlerError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }
        self.json()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HandlerError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)).into())
    }
}

#[derive(Debug, Error)]
pub enum HandlerError {
    /// A deliberate client-facing refusal (400/401/403/405), rendered as is
    #[error("{0}")]
    Rejected(ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ApiError> for HandlerError {
    fn from(err: ApiError) -> Self {
        HandlerError::Rejected(err)
    }
}

#[async_trait]
pub trait EndpointHandler: Send + Sync {
    /// Methods this endpoint answers; an empty slice accepts any method
    fn methods(&self) -> &'static [&'static str];

    async fn handle(&self, ctx: EndpointContext) -> Result<Response, HandlerError>;
}

/// Final non-empty path segment, ignoring any query string
pub fn endpoint_name(path: &str) -> Option<&str> {
    let path = path.split_once('?').map_or(path, |(p, _)| p);
    path.rsplit('/').find(|segment| !segment.is_empty())
}

pub struct Dispatcher {
    verifier: TokenVerifier,
    routes: RouteTable,
}

impl Dispatcher {
    pub fn new(verifier: TokenVerifier, routes: RouteTable) -> Self {
        Self { verifier, routes }
    }

    /// Route one request. Never fails: errors and panics from verification
    /// or the handler come back as JSON error responses.
    pub async fn dispatch(&self, method: Method, uri: &Uri, headers: HeaderMap, body: Bytes) -> Response {
        let endpoint = endpoint_name(uri.path()).unwrap_or_default().to_string();

        let outcome = AssertUnwindSafe(self.route(endpoint.clone(), method, uri, headers, body))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(HandlerError::Rejected(err))) => err.into_response(),
            Ok(Err(err)) => {
                tracing::error!(endpoint = %endpoint, error = %err, "handler failed");
                ApiError::internal_server_error(err.to_string()).into_response()
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(endpoint = %endpoint, error = %message, "handler panicked");
                ApiError::internal_server_error(message).into_response()
            }
        }
    }

    async fn route(
        &self,
        endpoint: String,
        method: Method,
        uri: &Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Response, HandlerError> {
        let route = self.routes.resolve(&endpoint);
        let auth_header = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok());

        let caller = match route.access {
            Access::Cron => None,
            Access::Authenticated => match self.verifier.verify(auth_header).await {
                Ok(identity) => Some(Caller::from(&identity)),
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint, reason = %e, "rejecting unauthenticated request");
                    return Err(ApiError::from(e).into());
                }
            },
            Access::AlternateAuth => match self.verifier.verify(auth_header).await {
                Ok(identity) => Some(Caller::from(&identity)),
                Err(e) => {
                    tracing::debug!(endpoint = %endpoint, reason = %e, "no bearer identity, handler authenticates itself");
                    None
                }
            },
        };

        if !route.allows(&method) {
            return Err(ApiError::method_not_allowed(&method).into());
        }

        let ctx = EndpointContext {
            endpoint,
            method,
            headers,
            query: uri.query().map(str::to_string),
            body,
            caller,
        };

        route.handler.handle(ctx).await
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
