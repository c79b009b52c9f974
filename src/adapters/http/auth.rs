//! Request-context extractors: bearer authentication and org/project scope.

use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::CoreError;
use crate::domain::models::ScopeFilter;
use crate::domain::ports::AuthUser;

use super::error::ApiError;
use super::server::AppState;

/// The authenticated principal, from `Authorization: Bearer <token>`.
pub struct AuthContext(pub AuthUser);

impl FromRequestParts<Arc<AppState>> for AuthContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing Authorization header"))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("expected a bearer token"))?;

        let user = state.verifier.verify(token).await.map_err(|e| match e {
            CoreError::Forbidden(_) => ApiError::unauthorized("invalid bearer token"),
            other => ApiError::from(other),
        })?;

        Ok(Self(user))
    }
}

/// Tenant context for list endpoints: `org_id` (query or `X-Org-ID`) is
/// mandatory, `project_id` (query or `X-Project-ID`) optional.
pub struct OrgContext {
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
}

impl OrgContext {
    /// The computed-scope filter for this request.
    pub fn scope(&self, user: &AuthUser) -> ScopeFilter {
        ScopeFilter {
            organization_id: self.organization_id,
            user_id: user.user_id,
            project_id: self.project_id,
        }
    }
}

impl FromRequestParts<Arc<AppState>> for OrgContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Query(query): Query<HashMap<String, String>> =
            Query::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::bad_request("malformed query string"))?;

        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };

        let org_raw = query
            .get("org_id")
            .cloned()
            .or_else(|| header("X-Org-ID"))
            .ok_or_else(|| ApiError::from(CoreError::MissingOrgContext))?;
        let organization_id = Uuid::parse_str(&org_raw)
            .map_err(|_| ApiError::bad_request(format!("invalid org_id: {org_raw}")))?;

        let project_id = match query.get("project_id").cloned().or_else(|| header("X-Project-ID"))
        {
            None => None,
            Some(raw) if raw.is_empty() => None,
            Some(raw) => Some(
                Uuid::parse_str(&raw)
                    .map_err(|_| ApiError::bad_request(format!("invalid project_id: {raw}")))?,
            ),
        };

        Ok(Self { organization_id, project_id })
    }
}
