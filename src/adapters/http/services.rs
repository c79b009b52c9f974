//! Service endpoints, including integration links.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::CoreError;
use crate::domain::models::{
    NotificationPrefs, ResourceType, RoutingConditions, Service, ServiceIntegration,
};
use crate::domain::ports::{IntegrationRepository, ServiceRepository};
use crate::services::coerce_uuid_field;

use super::auth::{AuthContext, OrgContext};
use super::error::ApiError;
use super::server::AppState;

#[derive(Debug, Serialize)]
pub struct ServiceResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
    pub group_id: Uuid,
    pub name: String,
    pub description: String,
    pub routing_key: String,
    pub escalation_policy_id: Option<Uuid>,
    pub notification_prefs: NotificationPrefs,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Service> for ServiceResponse {
    fn from(s: Service) -> Self {
        Self {
            id: s.id,
            organization_id: s.organization_id,
            project_id: s.project_id,
            group_id: s.group_id,
            name: s.name,
            description: s.description,
            routing_key: s.routing_key,
            escalation_policy_id: s.escalation_policy_id,
            notification_prefs: s.notification_prefs,
            created_at: s.created_at.to_rfc3339(),
            updated_at: s.updated_at.to_rfc3339(),
        }
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    org: OrgContext,
) -> Result<Json<Vec<ServiceResponse>>, ApiError> {
    let scope = org.scope(&user);
    let services = state.services.list(&scope).await?;
    Ok(Json(services.into_iter().map(ServiceResponse::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub group_id: Uuid,
    pub name: String,
    pub routing_key: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub escalation_policy_id: Option<String>,
    #[serde(default)]
    pub notification_prefs: Option<NotificationPrefs>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    org: OrgContext,
    Json(request): Json<CreateServiceRequest>,
) -> Result<Json<ServiceResponse>, ApiError> {
    if request.name.trim().is_empty() || request.routing_key.trim().is_empty() {
        return Err(ApiError::bad_request("name and routing_key are required"));
    }
    state
        .access
        .require_access(user.user_id, ResourceType::Group, request.group_id, org.organization_id)
        .await?;

    let mut service = Service::new(
        org.organization_id,
        request.group_id,
        request.name,
        request.routing_key,
    );
    service.project_id = org.project_id;
    service.description = request.description;
    service.escalation_policy_id = coerce_uuid_field(request.escalation_policy_id.as_deref())?;
    if let Some(prefs) = request.notification_prefs {
        service.notification_prefs = prefs;
    }

    state.services.create(&service).await?;
    Ok(Json(service.into()))
}

async fn load_checked(
    state: &AppState,
    user_id: Uuid,
    service_id: Uuid,
) -> Result<Service, ApiError> {
    let service = state
        .services
        .get(service_id)
        .await?
        .ok_or_else(|| CoreError::not_found("service", service_id))?;
    state
        .access
        .require_access(user_id, ResourceType::Group, service.group_id, service.organization_id)
        .await?;
    Ok(service)
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ServiceResponse>, ApiError> {
    let service = load_checked(&state, user.user_id, id).await?;
    Ok(Json(service.into()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateServiceRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub escalation_policy_id: Option<String>,
    #[serde(default)]
    pub notification_prefs: Option<NotificationPrefs>,
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateServiceRequest>,
) -> Result<Json<ServiceResponse>, ApiError> {
    let mut service = load_checked(&state, user.user_id, id).await?;

    if let Some(name) = request.name {
        if name.trim().is_empty() {
            return Err(ApiError::bad_request("service name cannot be empty"));
        }
        service.name = name;
    }
    if let Some(description) = request.description {
        service.description = description;
    }
    if request.escalation_policy_id.is_some() {
        service.escalation_policy_id =
            coerce_uuid_field(request.escalation_policy_id.as_deref())?;
    }
    if let Some(prefs) = request.notification_prefs {
        service.notification_prefs = prefs;
    }

    state.services.update(&service).await?;
    Ok(Json(service.into()))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_checked(&state, user.user_id, id).await?;
    state.services.deactivate(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

#[derive(Debug, Deserialize)]
pub struct LinkIntegrationRequest {
    pub integration_id: Uuid,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default)]
    pub routing_conditions: RoutingConditions,
}

fn default_priority() -> u32 {
    100
}

pub async fn link_integration(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<LinkIntegrationRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_checked(&state, user.user_id, id).await?;

    let mut link = ServiceIntegration::new(id, request.integration_id, request.priority);
    link.routing_conditions = request.routing_conditions;
    link.validate().map_err(ApiError::bad_request)?;

    state.integrations.link_service(&link).await?;
    Ok(Json(serde_json::json!({ "link_id": link.id })))
}

pub async fn unlink_integration(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path((id, integration_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_checked(&state, user.user_id, id).await?;
    state.integrations.unlink_service(id, integration_id).await?;
    Ok(Json(serde_json::json!({ "unlinked": integration_id })))
}
