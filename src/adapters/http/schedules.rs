//! Scheduling endpoints: schedulers, shifts, overrides, and the on-call
//! lookup.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::CoreError;
use crate::domain::models::{
    EffectiveShift, OverrideType, ResourceType, RotationType, ScheduleScope, Scheduler, Shift,
};
use crate::domain::ports::{GroupRepository, OnCallScope, ServiceRepository};

use super::auth::{AuthContext, OrgContext};
use super::error::ApiError;
use super::server::AppState;

#[derive(Debug, Serialize)]
pub struct SchedulerResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub display_name: String,
    pub rotation_type: String,
    pub created_at: String,
}

impl From<Scheduler> for SchedulerResponse {
    fn from(s: Scheduler) -> Self {
        Self {
            id: s.id,
            organization_id: s.organization_id,
            group_id: s.group_id,
            name: s.name,
            display_name: s.display_name,
            rotation_type: s.rotation_type.as_str().to_string(),
            created_at: s.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShiftResponse {
    pub id: Uuid,
    pub scheduler_id: Uuid,
    pub user_id: Uuid,
    pub start_time: String,
    pub end_time: String,
    pub rotation_days: u32,
    pub is_recurring: bool,
    pub service_id: Option<Uuid>,
    pub schedule_scope: String,
}

impl From<Shift> for ShiftResponse {
    fn from(s: Shift) -> Self {
        Self {
            id: s.id,
            scheduler_id: s.scheduler_id,
            user_id: s.user_id,
            start_time: s.start_time.to_rfc3339(),
            end_time: s.end_time.to_rfc3339(),
            rotation_days: s.rotation_days,
            is_recurring: s.is_recurring,
            service_id: s.service_id,
            schedule_scope: s.schedule_scope.as_str().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ShiftSpec {
    pub user_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub rotation_days: Option<u32>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub service_id: Option<Uuid>,
    #[serde(default)]
    pub schedule_scope: Option<String>,
}

impl ShiftSpec {
    fn into_shift(self, scheduler_id: Uuid) -> Result<Shift, ApiError> {
        let mut shift = Shift::new(scheduler_id, self.user_id, self.start_time, self.end_time);
        if let Some(days) = self.rotation_days {
            shift.rotation_days = days;
        }
        shift.is_recurring = self.is_recurring;
        shift.service_id = self.service_id;
        if let Some(raw) = self.schedule_scope {
            shift.schedule_scope = ScheduleScope::from_str(&raw)
                .ok_or_else(|| ApiError::bad_request(format!("unknown schedule_scope: {raw}")))?;
        }
        Ok(shift)
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateSchedulerRequest {
    pub group_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub rotation_type: Option<String>,
    #[serde(default)]
    pub shifts: Vec<ShiftSpec>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    org: OrgContext,
    Json(request): Json<CreateSchedulerRequest>,
) -> Result<Json<SchedulerResponse>, ApiError> {
    state
        .access
        .require_access(user.user_id, ResourceType::Group, request.group_id, org.organization_id)
        .await?;

    let display_name = request.display_name.unwrap_or_else(|| request.name.clone());
    let mut scheduler =
        Scheduler::new(org.organization_id, request.group_id, request.name, display_name);
    scheduler.project_id = org.project_id;
    if let Some(raw) = request.rotation_type {
        scheduler.rotation_type = RotationType::from_str(&raw)
            .ok_or_else(|| ApiError::bad_request(format!("unknown rotation_type: {raw}")))?;
    }

    let scheduler_id = scheduler.id;
    let shifts = request
        .shifts
        .into_iter()
        .map(|spec| spec.into_shift(scheduler_id))
        .collect::<Result<Vec<_>, _>>()?;

    let created = state.schedules.create_scheduler(scheduler, shifts).await?;
    Ok(Json(created.into()))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    org: OrgContext,
) -> Result<Json<Vec<SchedulerResponse>>, ApiError> {
    let scope = org.scope(&user);
    let schedulers = state.schedules.list_schedulers(&scope).await?;
    Ok(Json(schedulers.into_iter().map(SchedulerResponse::from).collect()))
}

/// Load a scheduler and verify the caller belongs to its owning group.
async fn load_checked(
    state: &AppState,
    user_id: Uuid,
    scheduler_id: Uuid,
) -> Result<Scheduler, ApiError> {
    let scheduler = state.schedules.get_scheduler(scheduler_id).await?;
    state
        .access
        .require_access(
            user_id,
            ResourceType::Group,
            scheduler.group_id,
            scheduler.organization_id,
        )
        .await?;
    Ok(scheduler)
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<SchedulerResponse>, ApiError> {
    let scheduler = load_checked(&state, user.user_id, id).await?;
    Ok(Json(scheduler.into()))
}

pub async fn remove(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    load_checked(&state, user.user_id, id).await?;
    state.schedules.deactivate_scheduler(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

pub async fn list_shifts(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ShiftResponse>>, ApiError> {
    load_checked(&state, user.user_id, id).await?;
    let shifts = state.schedules.list_shifts(id).await?;
    Ok(Json(shifts.into_iter().map(ShiftResponse::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct ReplaceShiftsRequest {
    pub shifts: Vec<ShiftSpec>,
}

pub async fn replace_shifts(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<ReplaceShiftsRequest>,
) -> Result<Json<Vec<ShiftResponse>>, ApiError> {
    load_checked(&state, user.user_id, id).await?;
    let shifts = request
        .shifts
        .into_iter()
        .map(|spec| spec.into_shift(id))
        .collect::<Result<Vec<_>, _>>()?;

    let replaced = state.schedules.replace_shifts(id, shifts).await?;
    Ok(Json(replaced.into_iter().map(ShiftResponse::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct CreateOverrideRequest {
    pub new_user_id: Uuid,
    pub override_start_time: DateTime<Utc>,
    pub override_end_time: DateTime<Utc>,
    #[serde(default)]
    pub override_type: Option<String>,
    #[serde(default)]
    pub reason: String,
    /// Must be set when the override spans the entire shift window.
    #[serde(default)]
    pub full: bool,
}

#[derive(Debug, Serialize)]
pub struct OverrideResponse {
    pub id: Uuid,
    pub original_schedule_id: Uuid,
    pub new_user_id: Uuid,
    pub override_start_time: String,
    pub override_end_time: String,
    pub override_type: String,
    pub reason: String,
}

pub async fn create_override(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateOverrideRequest>,
) -> Result<Json<OverrideResponse>, ApiError> {
    let shift = state.schedules.get_shift(id).await?;
    load_checked(&state, user.user_id, shift.scheduler_id).await?;

    let override_type = match request.override_type {
        None => OverrideType::default(),
        Some(raw) => OverrideType::from_str(&raw)
            .ok_or_else(|| ApiError::bad_request(format!("unknown override_type: {raw}")))?,
    };

    let ov = state
        .schedules
        .create_override(
            id,
            request.new_user_id,
            request.override_start_time,
            request.override_end_time,
            override_type,
            request.reason,
            request.full,
        )
        .await?;

    Ok(Json(OverrideResponse {
        id: ov.id,
        original_schedule_id: ov.original_schedule_id,
        new_user_id: ov.new_user_id,
        override_start_time: ov.override_start_time.to_rfc3339(),
        override_end_time: ov.override_end_time.to_rfc3339(),
        override_type: ov.override_type.as_str().to_string(),
        reason: ov.reason,
    }))
}

pub async fn remove_override(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let ov = state.schedules.get_override(id).await?;
    let shift = state.schedules.get_shift(ov.original_schedule_id).await?;
    load_checked(&state, user.user_id, shift.scheduler_id).await?;

    state.schedules.remove_override(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

#[derive(Debug, Deserialize)]
pub struct OnCallQuery {
    #[serde(default)]
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub scheduler_id: Option<Uuid>,
    #[serde(default)]
    pub service_id: Option<Uuid>,
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct EffectiveShiftResponse {
    pub shift_id: Uuid,
    pub scheduler_id: Uuid,
    pub group_id: Uuid,
    pub service_id: Option<Uuid>,
    pub start_time: String,
    pub end_time: String,
    pub effective_user_id: Uuid,
    pub original_user_id: Uuid,
    pub override_id: Option<Uuid>,
}

impl From<EffectiveShift> for EffectiveShiftResponse {
    fn from(e: EffectiveShift) -> Self {
        Self {
            shift_id: e.shift_id,
            scheduler_id: e.scheduler_id,
            group_id: e.group_id,
            service_id: e.service_id,
            start_time: e.start_time.to_rfc3339(),
            end_time: e.end_time.to_rfc3339(),
            effective_user_id: e.effective_user_id,
            original_user_id: e.original_user_id,
            override_id: e.override_id,
        }
    }
}

/// "Who is on-call right now for this scope?"
pub async fn on_call(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Query(query): Query<OnCallQuery>,
) -> Result<Json<EffectiveShiftResponse>, ApiError> {
    let scope = match (query.group_id, query.scheduler_id, query.service_id) {
        (Some(group_id), None, None) => OnCallScope::Group(group_id),
        (None, Some(scheduler_id), None) => OnCallScope::Scheduler(scheduler_id),
        (None, None, Some(service_id)) => OnCallScope::Service(service_id),
        _ => {
            return Err(ApiError::bad_request(
                "exactly one of group_id, scheduler_id, service_id is required",
            ))
        }
    };

    // The caller must belong to the group the lookup resolves against.
    match scope {
        OnCallScope::Group(group_id) => {
            let group = state
                .groups
                .get(group_id)
                .await?
                .ok_or_else(|| CoreError::not_found("group", group_id))?;
            state
                .access
                .require_access(user.user_id, ResourceType::Group, group.id, group.organization_id)
                .await?;
        }
        OnCallScope::Scheduler(scheduler_id) => {
            load_checked(&state, user.user_id, scheduler_id).await?;
        }
        OnCallScope::Service(service_id) => {
            let service = state
                .services
                .get(service_id)
                .await?
                .ok_or_else(|| CoreError::not_found("service", service_id))?;
            state
                .access
                .require_access(
                    user.user_id,
                    ResourceType::Group,
                    service.group_id,
                    service.organization_id,
                )
                .await?;
        }
    }
    let at = query.at.unwrap_or_else(Utc::now);

    let row = state.schedules.require_on_call(scope, at).await?;
    Ok(Json(row.into()))
}
