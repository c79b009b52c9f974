//! Integration endpoints.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::CoreError;
use crate::domain::models::{Integration, IntegrationType};
use crate::domain::ports::IntegrationRepository;

use super::auth::{AuthContext, OrgContext};
use super::error::ApiError;
use super::server::AppState;

#[derive(Debug, Serialize)]
pub struct IntegrationResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
    pub name: String,
    pub integration_type: String,
    pub webhook_url: String,
    pub is_active: bool,
    pub last_heartbeat: Option<String>,
    pub heartbeat_interval: u32,
    pub created_at: String,
}

impl IntegrationResponse {
    fn from_integration(i: Integration, public_base: &str) -> Self {
        Self {
            id: i.id,
            organization_id: i.organization_id,
            project_id: i.project_id,
            name: i.name.clone(),
            integration_type: i.integration_type.as_str().to_string(),
            webhook_url: i.webhook_url(public_base),
            is_active: i.is_active,
            last_heartbeat: i.last_heartbeat.map(|t| t.to_rfc3339()),
            heartbeat_interval: i.heartbeat_interval,
            created_at: i.created_at.to_rfc3339(),
        }
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    org: OrgContext,
) -> Result<Json<Vec<IntegrationResponse>>, ApiError> {
    let scope = org.scope(&user);
    let integrations = state.integrations.list(&scope).await?;
    Ok(Json(
        integrations
            .into_iter()
            .map(|i| IntegrationResponse::from_integration(i, &state.public_base_url))
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CreateIntegrationRequest {
    pub name: String,
    pub integration_type: String,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub heartbeat_interval: Option<u32>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    org: OrgContext,
    Json(request): Json<CreateIntegrationRequest>,
) -> Result<Json<IntegrationResponse>, ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("integration name cannot be empty"));
    }
    state.access.require_org_member(user.user_id, org.organization_id).await?;
    let integration_type = IntegrationType::from_str(&request.integration_type).ok_or_else(|| {
        ApiError::bad_request(format!("unknown integration type: {}", request.integration_type))
    })?;

    let mut integration = Integration::new(org.organization_id, request.name, integration_type);
    integration.project_id = org.project_id;
    if let Some(config) = request.config {
        integration.config = config;
    }
    integration.webhook_secret = request.webhook_secret;
    if let Some(interval) = request.heartbeat_interval {
        integration.heartbeat_interval = interval;
    }

    state.integrations.create(&integration).await?;
    Ok(Json(IntegrationResponse::from_integration(integration, &state.public_base_url)))
}

/// Load an integration and verify the caller belongs to its organization.
/// Integrations carry webhook secrets and routing config, so every by-ID
/// operation goes through here.
async fn load_checked(
    state: &AppState,
    user_id: Uuid,
    integration_id: Uuid,
) -> Result<Integration, ApiError> {
    let integration = state
        .integrations
        .get(integration_id)
        .await?
        .ok_or_else(|| CoreError::not_found("integration", integration_id))?;
    state.access.require_org_member(user_id, integration.organization_id).await?;
    Ok(integration)
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<IntegrationResponse>, ApiError> {
    let integration = load_checked(&state, user.user_id, id).await?;
    Ok(Json(IntegrationResponse::from_integration(integration, &state.public_base_url)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateIntegrationRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub heartbeat_interval: Option<u32>,
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateIntegrationRequest>,
) -> Result<Json<IntegrationResponse>, ApiError> {
    let mut integration = load_checked(&state, user.user_id, id).await?;

    if let Some(name) = request.name {
        if name.trim().is_empty() {
            return Err(ApiError::bad_request("integration name cannot be empty"));
        }
        integration.name = name;
    }
    if let Some(config) = request.config {
        integration.config = config;
    }
    if request.webhook_secret.is_some() {
        integration.webhook_secret = request.webhook_secret;
    }
    if let Some(is_active) = request.is_active {
        integration.is_active = is_active;
    }
    if let Some(interval) = request.heartbeat_interval {
        integration.heartbeat_interval = interval;
    }

    state.integrations.update(&integration).await?;
    Ok(Json(IntegrationResponse::from_integration(integration, &state.public_base_url)))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_checked(&state, user.user_id, id).await?;
    state.integrations.deactivate(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub integration_id: Uuid,
    pub status: String,
}

pub async fn health(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<HealthResponse>, ApiError> {
    load_checked(&state, user.user_id, id).await?;
    let status = state.routing.health(id).await?;
    Ok(Json(HealthResponse { integration_id: id, status: status.as_str().to_string() }))
}

/// Manual heartbeat stamp, for senders that cannot embed one in payloads.
pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_checked(&state, user.user_id, id).await?;
    let stamped = state.routing.heartbeat(id).await?;
    if !stamped {
        return Err(CoreError::not_found("integration", id).into());
    }
    Ok(Json(serde_json::json!({ "integration_id": id, "heartbeat": "ok" })))
}
