//! Group endpoints, including membership management.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::CoreError;
use crate::domain::models::{
    EscalationMethod, Group, Membership, ResourceType, Visibility,
};
use crate::domain::ports::{GroupRepository, MembershipRepository};

use super::auth::{AuthContext, OrgContext};
use super::error::ApiError;
use super::server::AppState;

#[derive(Debug, Serialize)]
pub struct GroupResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub visibility: String,
    pub escalation_method: String,
    pub escalation_timeout: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Group> for GroupResponse {
    fn from(g: Group) -> Self {
        Self {
            id: g.id,
            organization_id: g.organization_id,
            project_id: g.project_id,
            name: g.name,
            description: g.description,
            visibility: g.visibility.as_str().to_string(),
            escalation_method: g.escalation_method.as_str().to_string(),
            escalation_timeout: g.escalation_timeout,
            created_at: g.created_at.to_rfc3339(),
            updated_at: g.updated_at.to_rfc3339(),
        }
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    org: OrgContext,
) -> Result<Json<Vec<GroupResponse>>, ApiError> {
    let scope = org.scope(&user);
    let groups = state.groups.list(&scope).await?;
    Ok(Json(groups.into_iter().map(GroupResponse::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub escalation_method: Option<String>,
    #[serde(default)]
    pub escalation_timeout: Option<u32>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    org: OrgContext,
    Json(request): Json<CreateGroupRequest>,
) -> Result<Json<GroupResponse>, ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("group name cannot be empty"));
    }

    let mut group = Group::new(org.organization_id, request.name);
    group.project_id = org.project_id;
    group.description = request.description;
    if let Some(raw) = request.visibility {
        group.visibility = Visibility::from_str(&raw)
            .ok_or_else(|| ApiError::bad_request(format!("unknown visibility: {raw}")))?;
    }
    if let Some(raw) = request.escalation_method {
        group.escalation_method = EscalationMethod::from_str(&raw)
            .ok_or_else(|| ApiError::bad_request(format!("unknown escalation_method: {raw}")))?;
    }
    if let Some(timeout) = request.escalation_timeout {
        group.escalation_timeout = timeout;
    }

    state.groups.create(&group).await?;

    // The creator becomes the group's first member.
    let membership = Membership::new(user.user_id, ResourceType::Group, group.id, "admin");
    state.memberships.create(&membership).await?;

    Ok(Json(group.into()))
}

async fn load_checked(
    state: &AppState,
    user_id: Uuid,
    group_id: Uuid,
) -> Result<Group, ApiError> {
    let group = state
        .groups
        .get(group_id)
        .await?
        .ok_or_else(|| CoreError::not_found("group", group_id))?;
    state
        .access
        .require_access(user_id, ResourceType::Group, group.id, group.organization_id)
        .await?;
    Ok(group)
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<GroupResponse>, ApiError> {
    let group = load_checked(&state, user.user_id, id).await?;
    Ok(Json(group.into()))
}

#[derive(Debug, Deserialize)]
pub struct UpdateGroupRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub escalation_method: Option<String>,
    #[serde(default)]
    pub escalation_timeout: Option<u32>,
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateGroupRequest>,
) -> Result<Json<GroupResponse>, ApiError> {
    let mut group = load_checked(&state, user.user_id, id).await?;

    if let Some(name) = request.name {
        if name.trim().is_empty() {
            return Err(ApiError::bad_request("group name cannot be empty"));
        }
        group.name = name;
    }
    if let Some(description) = request.description {
        group.description = description;
    }
    if let Some(raw) = request.visibility {
        group.visibility = Visibility::from_str(&raw)
            .ok_or_else(|| ApiError::bad_request(format!("unknown visibility: {raw}")))?;
    }
    if let Some(raw) = request.escalation_method {
        group.escalation_method = EscalationMethod::from_str(&raw)
            .ok_or_else(|| ApiError::bad_request(format!("unknown escalation_method: {raw}")))?;
    }
    if let Some(timeout) = request.escalation_timeout {
        group.escalation_timeout = timeout;
    }

    state.groups.update(&group).await?;
    Ok(Json(group.into()))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_checked(&state, user.user_id, id).await?;
    state.groups.deactivate(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    "member".to_string()
}

pub async fn add_member(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<AddMemberRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_checked(&state, user.user_id, id).await?;

    let membership = Membership::new(request.user_id, ResourceType::Group, id, request.role);
    state.memberships.create(&membership).await?;
    Ok(Json(serde_json::json!({ "membership_id": membership.id })))
}

pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path((id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_checked(&state, user.user_id, id).await?;
    state.memberships.delete(member_id, ResourceType::Group, id).await?;
    Ok(Json(serde_json::json!({ "removed": member_id })))
}
