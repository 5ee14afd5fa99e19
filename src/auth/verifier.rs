use std::sync::Arc;

use super::{AuthError, AuthResult, Identity, IdentityStore};

const BEARER_PREFIX: &str = "Bearer ";

/// Extract the token from an Authorization header value.
///
/// Returns `None` when the header is absent, uses another scheme, or carries
/// an empty token.
pub fn bearer_token(auth_header: Option<&str>) -> Option<&str> {
    let token = auth_header?.strip_prefix(BEARER_PREFIX)?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Turns a presented bearer token into an [`Identity`].
///
/// Two sequential lookups: token to user, then user id to profile. A failed
/// profile lookup still authenticates; role checks downstream must cope with
/// `profile: None`.
#[derive(Clone)]
pub struct TokenVerifier {
    store: Arc<dyn IdentityStore>,
}

impl TokenVerifier {
    pub fn new(store: Arc<dyn IdentityStore>) -> Self {
        Self { store }
    }

    pub async fn verify(&self, auth_header: Option<&str>) -> AuthResult {
        let Some(token) = bearer_token(auth_header) else {
            return Err(AuthError::MissingToken);
        };

        let user = match self.store.resolve_token(token).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(error = %e, "token resolution failed");
                return Err(AuthError::InvalidToken(e.to_string()));
            }
        };

        let profile = match self.store.get_profile(&user.id).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "profile lookup failed, continuing without profile");
                None
            }
        };

        Ok(Identity {
            id: user.id,
            email: user.email,
            profile,
        })
    }
}
