//! Bearer token authentication against the external identity store.
//!
//! The store is reached through [`IdentityStore`]; the production
//! implementation is the Supabase client and tests use the in-memory store.

mod verifier;

pub use verifier::{bearer_token, TokenVerifier};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::store::StoreError;

/// Base user record returned by the identity store for a token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Profile row attached to a user; arbitrary fields, `role` being the one we read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(pub Map<String, Value>);

impl Profile {
    pub fn role(&self) -> Option<&str> {
        self.0.get("role").and_then(Value::as_str)
    }
}

/// Resolved caller. Built fresh for each request and dropped with it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
    pub profile: Option<Profile>,
}

impl Identity {
    pub fn role(&self) -> Option<&str> {
        self.profile.as_ref().and_then(Profile::role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no valid auth token provided")]
    MissingToken,
    /// The identity store refused the token or could not be reached
    #[error("{0}")]
    InvalidToken(String),
}

pub type AuthResult = Result<Identity, AuthError>;

#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Exchange a bearer token for the base user record
    async fn resolve_token(&self, token: &str) -> Result<User, StoreError>;

    /// Fetch the profile row for a user, `None` if there is none
    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, StoreError>;
}
