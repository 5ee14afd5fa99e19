use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::http::Method;
use thiserror::Error;

use super::EndpointHandler;

/// How a route authenticates its callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// System-triggered (scheduled jobs); the token verifier is never called
    Cron,
    /// Requires a verified bearer token
    Authenticated,
    /// Token is verified when present, but failure does not reject the
    /// request; the handler authenticates by its own means
    AlternateAuth,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Cron => write!(f, "cron"),
            Access::Authenticated => write!(f, "authenticated"),
            Access::AlternateAuth => write!(f, "alternate-auth"),
        }
    }
}

#[derive(Clone)]
pub struct Route {
    pub access: Access,
    pub(crate) handler: Arc<dyn EndpointHandler>,
}

impl Route {
    fn new<H: EndpointHandler + 'static>(access: Access, handler: H) -> Self {
        Self {
            access,
            handler: Arc::new(handler),
        }
    }

    /// Methods the route answers. Empty means any method.
    pub fn methods(&self) -> &'static [&'static str] {
        self.handler.methods()
    }

    pub fn allows(&self, method: &Method) -> bool {
        let methods = self.methods();
        methods.is_empty() || methods.contains(&method.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteTableError {
    #[error("duplicate endpoint name '{0}'")]
    Duplicate(String),
    #[error("invalid endpoint name '{0}'")]
    InvalidName(String),
    #[error("no fallback route configured")]
    MissingFallback,
}

/// Endpoint name to route mapping, fixed at startup.
///
/// Names that are not registered resolve to the fallback route instead of a
/// 404. Whether that should stay a generic route or become a hard miss is
/// still open, so misses are logged.
pub struct RouteTable {
    routes: HashMap<String, Route>,
    fallback: Route,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    /// Look up `name`, falling back to the catch-all route.
    pub fn resolve(&self, name: &str) -> &Route {
        match self.routes.get(name) {
            Some(route) => route,
            None => {
                tracing::debug!(endpoint = %name, "unrecognized endpoint, using fallback route");
                &self.fallback
            }
        }
    }

    pub fn fallback(&self) -> &Route {
        &self.fallback
    }

    /// Registered routes sorted by name
    pub fn entries(&self) -> Vec<(&str, &Route)> {
        let mut entries: Vec<_> = self.routes.iter().map(|(name, route)| (name.as_str(), route)).collect();
        entries.sort_by_key(|(name, _)| *name);
        entries
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
pub struct RouteTableBuilder {
    routes: Vec<(String, Route)>,
    fallback: Option<Route>,
}

impl RouteTableBuilder {
    pub fn cron<H: EndpointHandler + 'static>(self, name: &str, handler: H) -> Self {
        self.add(name, Route::new(Access::Cron, handler))
    }

    pub fn authenticated<H: EndpointHandler + 'static>(self, name: &str, handler: H) -> Self {
        self.add(name, Route::new(Access::Authenticated, handler))
    }

    pub fn alternate_auth<H: EndpointHandler + 'static>(self, name: &str, handler: H) -> Self {
        self.add(name, Route::new(Access::AlternateAuth, handler))
    }

    /// Route used for unrecognized names; always requires authentication
    pub fn fallback<H: EndpointHandler + 'static>(mut self, handler: H) -> Self {
        self.fallback = Some(Route::new(Access::Authenticated, handler));
        self
    }

    fn add(mut self, name: &str, route: Route) -> Self {
        self.routes.push((name.to_string(), route));
        self
    }

    pub fn build(self) -> Result<RouteTable, RouteTableError> {
        let mut routes = HashMap::with_capacity(self.routes.len());

        for (name, route) in self.routes {
            if name.is_empty() || name.contains('/') || name.contains('?') || name.trim() != name {
                return Err(RouteTableError::InvalidName(name));
            }
            if routes.contains_key(&name) {
                return Err(RouteTableError::Duplicate(name));
            }
            routes.insert(name, route);
        }

        let fallback = self.fallback.ok_or(RouteTableError::MissingFallback)?;

        Ok(RouteTable { routes, fallback })
    }
}
