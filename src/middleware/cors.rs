//! CORS headers and preflight short-circuit.
//!
//! Runs outside every route (and the fallback), so the three
//! `access-control-*` headers are present on all responses, errors included.
//! Any `OPTIONS` request is answered `200` with an empty body before routing.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::{ConfigError, CorsConfig};

#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allow_origin: HeaderValue,
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Result<Self, ConfigError> {
        let allow_methods = HeaderValue::from_str(&config.allow_methods.join(", "))
            .map_err(|_| ConfigError::Invalid("CORS_ALLOW_METHODS"))?;
        let allow_headers = HeaderValue::from_str(&config.allow_headers.join(", "))
            .map_err(|_| ConfigError::Invalid("CORS_ALLOW_HEADERS"))?;

        Ok(Self {
            allow_origin: HeaderValue::from_static("*"),
            allow_methods,
            allow_headers,
        })
    }

    fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, self.allow_origin.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
    }
}

pub async fn cors_middleware(State(policy): State<CorsPolicy>, request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        policy.apply(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    policy.apply(response.headers_mut());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_joins_configured_lists() {
        let policy = CorsPolicy::from_config(&CorsConfig::notifications_api()).unwrap();
        let mut headers = HeaderMap::new();
        policy.apply(&mut headers);

        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "GET, POST, PUT, DELETE, OPTIONS");
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
            "Content-Type, Authorization, stripe-signature"
        );
    }

    #[test]
    fn control_characters_are_rejected() {
        let config = CorsConfig {
            allow_methods: vec!["GET\n".to_string()],
            allow_headers: vec![],
        };
        assert!(matches!(
            CorsPolicy::from_config(&config),
            Err(ConfigError::Invalid("CORS_ALLOW_METHODS"))
        ));
    }
}
