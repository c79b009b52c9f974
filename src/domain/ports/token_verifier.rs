//! Bearer-token verification port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::CoreResult;

/// The authenticated principal attached to a request context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
}

/// Validates a bearer token against the identity provider.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> CoreResult<AuthUser>;
}
