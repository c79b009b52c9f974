//! Token verification against the identity provider.
//!
//! The HTTP verifier calls the provider's user endpoint with the presented
//! bearer token; token format internals stay with the provider. The static
//! verifier backs tests and local development.

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::ports::{AuthUser, TokenVerifier};

pub struct HttpTokenVerifier {
    http_client: ReqwestClient,
    base_url: String,
    anon_key: Option<String>,
}

#[derive(Deserialize)]
struct ProviderUser {
    id: Uuid,
    #[serde(default)]
    email: String,
    #[serde(default = "default_role")]
    role: String,
}

fn default_role() -> String {
    "authenticated".to_string()
}

impl HttpTokenVerifier {
    pub fn new(base_url: impl Into<String>, anon_key: Option<String>) -> CoreResult<Self> {
        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| CoreError::DependencyFailed(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key,
        })
    }
}

#[async_trait]
impl TokenVerifier for HttpTokenVerifier {
    async fn verify(&self, token: &str) -> CoreResult<AuthUser> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let mut request = self
            .http_client
            .get(&url)
            .header("Authorization", format!("Bearer {token}"));
        if let Some(anon_key) = &self.anon_key {
            request = request.header("apikey", anon_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CoreError::DependencyFailed(format!("identity provider: {e}")))?;

        match response.status() {
            status if status.is_success() => {
                let user: ProviderUser = response
                    .json()
                    .await
                    .map_err(|e| CoreError::DependencyFailed(format!("identity provider: {e}")))?;
                Ok(AuthUser { user_id: user.id, email: user.email, role: user.role })
            }
            status if status.as_u16() == 401 || status.as_u16() == 403 => {
                Err(CoreError::Forbidden("invalid bearer token".to_string()))
            }
            status => Err(CoreError::DependencyFailed(format!(
                "identity provider returned {status}"
            ))),
        }
    }
}

/// Fixed token → user mapping. Used by tests and `serve` without a
/// configured provider.
#[derive(Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, AuthUser>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, user: AuthUser) -> Self {
        self.tokens.insert(token.into(), user);
        self
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> CoreResult<AuthUser> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| CoreError::Forbidden("invalid bearer token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_verifier() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            role: "authenticated".to_string(),
        };
        let verifier = StaticTokenVerifier::new().with_token("tok-1", user.clone());

        assert_eq!(verifier.verify("tok-1").await.unwrap(), user);
        assert!(matches!(
            verifier.verify("other").await,
            Err(CoreError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_http_verifier_accepts_valid_token() {
        let mut server = mockito::Server::new_async().await;
        let user_id = Uuid::new_v4();
        let body = format!(r#"{{"id": "{user_id}", "email": "a@example.com", "role": "authenticated"}}"#);
        let mock = server
            .mock("GET", "/auth/v1/user")
            .match_header("authorization", "Bearer tok-1")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let verifier = HttpTokenVerifier::new(server.url(), None).unwrap();
        let user = verifier.verify("tok-1").await.unwrap();
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.email, "a@example.com");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_verifier_rejects_401() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/auth/v1/user")
            .with_status(401)
            .create_async()
            .await;

        let verifier = HttpTokenVerifier::new(server.url(), None).unwrap();
        assert!(matches!(
            verifier.verify("bad").await,
            Err(CoreError::Forbidden(_))
        ));
    }
}
