//! Escalation policy endpoints.

use axum::extract::{Path, State};
use axum::response::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::models::{
    EscalationLevel, EscalationPolicy, EscalationTarget, ResourceType,
};

use super::auth::{AuthContext, OrgContext};
use super::error::ApiError;
use super::server::AppState;

#[derive(Debug, Deserialize)]
pub struct LevelSpec {
    pub level_number: u32,
    pub target_type: String,
    #[serde(default)]
    pub target_id: Option<Uuid>,
    #[serde(default = "default_timeout")]
    pub timeout_minutes: u32,
}

fn default_timeout() -> u32 {
    30
}

impl LevelSpec {
    fn into_level(self, policy_id: Uuid) -> Result<EscalationLevel, ApiError> {
        let target = EscalationTarget::from_parts(&self.target_type, self.target_id)
            .ok_or_else(|| {
                ApiError::bad_request(format!(
                    "invalid target: {} / {:?}",
                    self.target_type, self.target_id
                ))
            })?;
        Ok(EscalationLevel::new(policy_id, self.level_number, target)
            .with_timeout(self.timeout_minutes))
    }
}

#[derive(Debug, Serialize)]
pub struct LevelResponse {
    pub level_number: u32,
    pub target_type: String,
    pub target_id: Option<Uuid>,
    pub timeout_minutes: u32,
}

impl From<EscalationLevel> for LevelResponse {
    fn from(l: EscalationLevel) -> Self {
        Self {
            level_number: l.level_number,
            target_type: l.target.target_type().to_string(),
            target_id: l.target.target_id(),
            timeout_minutes: l.timeout_minutes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PolicyResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub group_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub levels: Vec<LevelResponse>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePolicyRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub group_id: Option<Uuid>,
    pub levels: Vec<LevelSpec>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    org: OrgContext,
    Json(request): Json<CreatePolicyRequest>,
) -> Result<Json<PolicyResponse>, ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("policy name cannot be empty"));
    }
    match request.group_id {
        Some(group_id) => {
            state
                .access
                .require_access(user.user_id, ResourceType::Group, group_id, org.organization_id)
                .await?;
        }
        None => state.access.require_org_member(user.user_id, org.organization_id).await?,
    }

    let mut policy = EscalationPolicy::new(org.organization_id, request.name);
    policy.project_id = org.project_id;
    policy.group_id = request.group_id;
    policy.description = request.description;

    let policy_id = policy.id;
    let levels = request
        .levels
        .into_iter()
        .map(|spec| spec.into_level(policy_id))
        .collect::<Result<Vec<_>, _>>()?;

    let created = state.escalations.create_policy(policy, levels.clone()).await?;
    Ok(Json(render(created, levels)))
}

fn render(policy: EscalationPolicy, levels: Vec<EscalationLevel>) -> PolicyResponse {
    PolicyResponse {
        id: policy.id,
        organization_id: policy.organization_id,
        group_id: policy.group_id,
        name: policy.name,
        description: policy.description,
        levels: levels.into_iter().map(LevelResponse::from).collect(),
        created_at: policy.created_at.to_rfc3339(),
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    org: OrgContext,
) -> Result<Json<Vec<PolicyResponse>>, ApiError> {
    let scope = org.scope(&user);
    let policies = state.escalations.list_policies(&scope).await?;

    let mut out = Vec::with_capacity(policies.len());
    for policy in policies {
        let levels = state.escalations.list_levels(policy.id).await?;
        out.push(render(policy, levels));
    }
    Ok(Json(out))
}

/// Load a policy and verify the caller may touch it: group membership when
/// the policy is group-scoped, org membership otherwise.
async fn load_checked(
    state: &AppState,
    user_id: Uuid,
    policy_id: Uuid,
) -> Result<EscalationPolicy, ApiError> {
    let policy = state.escalations.get_policy(policy_id).await?;
    match policy.group_id {
        Some(group_id) => {
            state
                .access
                .require_access(user_id, ResourceType::Group, group_id, policy.organization_id)
                .await?;
        }
        None => state.access.require_org_member(user_id, policy.organization_id).await?,
    }
    Ok(policy)
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<PolicyResponse>, ApiError> {
    let policy = load_checked(&state, user.user_id, id).await?;
    let levels = state.escalations.list_levels(id).await?;
    Ok(Json(render(policy, levels)))
}

#[derive(Debug, Deserialize)]
pub struct ReplaceLevelsRequest {
    pub levels: Vec<LevelSpec>,
}

pub async fn replace_levels(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<ReplaceLevelsRequest>,
) -> Result<Json<Vec<LevelResponse>>, ApiError> {
    load_checked(&state, user.user_id, id).await?;
    let levels = request
        .levels
        .into_iter()
        .map(|spec| spec.into_level(id))
        .collect::<Result<Vec<_>, _>>()?;

    let replaced = state.escalations.replace_levels(id, levels).await?;
    Ok(Json(replaced.into_iter().map(LevelResponse::from).collect()))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_checked(&state, user.user_id, id).await?;
    state.escalations.delete_policy(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}
