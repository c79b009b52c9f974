//! Incident endpoints.

use axum::extract::{Path, Query, State};
use axum::response::Json;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::models::{
    Incident, IncidentEvent, IncidentStatus, ResourceType, Severity, Urgency,
};
use crate::domain::ports::{
    AssigneeFilter, IncidentFilter, IncidentStats, SortOrder, TimeRange,
};
use crate::services::coerce_uuid_field;

use super::auth::{AuthContext, OrgContext};
use super::error::ApiError;
use super::server::AppState;

#[derive(Debug, Serialize)]
pub struct IncidentResponse {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub status: String,
    pub severity: String,
    pub urgency: String,
    pub source: String,
    pub service_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub escalation_policy_id: Option<Uuid>,
    pub current_escalation_level: u32,
    pub escalation_status: String,
    pub incident_key: Option<String>,
    pub labels: HashMap<String, String>,
    pub alert_count: u32,
    pub assigned_to: Option<Uuid>,
    pub acknowledged_by: Option<Uuid>,
    pub resolved_by: Option<Uuid>,
    pub created_at: String,
    pub updated_at: String,
    pub acknowledged_at: Option<String>,
    pub resolved_at: Option<String>,
}

impl From<Incident> for IncidentResponse {
    fn from(i: Incident) -> Self {
        Self {
            id: i.id,
            organization_id: i.organization_id,
            project_id: i.project_id,
            title: i.title,
            description: i.description,
            status: i.status.as_str().to_string(),
            severity: i.severity.as_str().to_string(),
            urgency: i.urgency.as_str().to_string(),
            source: i.source,
            service_id: i.service_id,
            group_id: i.group_id,
            escalation_policy_id: i.escalation_policy_id,
            current_escalation_level: i.current_escalation_level,
            escalation_status: i.escalation_status.as_str().to_string(),
            incident_key: i.incident_key,
            labels: i.labels,
            alert_count: i.alert_count,
            assigned_to: i.assigned_to,
            acknowledged_by: i.acknowledged_by,
            resolved_by: i.resolved_by,
            created_at: i.created_at.to_rfc3339(),
            updated_at: i.updated_at.to_rfc3339(),
            acknowledged_at: i.acknowledged_at.map(|t| t.to_rfc3339()),
            resolved_at: i.resolved_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub id: Uuid,
    pub incident_id: Uuid,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub created_at: String,
    pub created_by: Option<String>,
}

impl From<IncidentEvent> for EventResponse {
    fn from(e: IncidentEvent) -> Self {
        Self {
            id: e.id,
            incident_id: e.incident_id,
            event_type: e.event_type.as_str().to_string(),
            event_data: e.event_data,
            created_at: e.created_at.to_rfc3339(),
            created_by: e.created_by,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub service_id: Option<Uuid>,
    #[serde(default)]
    pub group_id: Option<Uuid>,
    #[serde(default)]
    pub time_range: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

impl ListQuery {
    fn into_filter(self) -> Result<IncidentFilter, ApiError> {
        let mut filter = IncidentFilter {
            search: self.search,
            service_id: self.service_id,
            group_id: self.group_id,
            page: self.page.unwrap_or(1),
            limit: self.limit.unwrap_or(50),
            ..Default::default()
        };

        if let Some(raw) = self.status {
            filter.status = Some(
                IncidentStatus::from_str(&raw)
                    .ok_or_else(|| ApiError::bad_request(format!("unknown status: {raw}")))?,
            );
        }
        if let Some(raw) = self.urgency {
            filter.urgency = Some(
                Urgency::from_str(&raw)
                    .ok_or_else(|| ApiError::bad_request(format!("unknown urgency: {raw}")))?,
            );
        }
        if let Some(raw) = self.severity {
            filter.severity = Some(
                Severity::from_str(&raw)
                    .ok_or_else(|| ApiError::bad_request(format!("unknown severity: {raw}")))?,
            );
        }
        if let Some(raw) = self.assigned_to {
            filter.assigned_to = AssigneeFilter::parse(&raw)
                .ok_or_else(|| ApiError::bad_request(format!("invalid assigned_to: {raw}")))?;
        }
        if let Some(raw) = self.time_range {
            filter.time_range = TimeRange::from_str(&raw)
                .ok_or_else(|| ApiError::bad_request(format!("unknown time_range: {raw}")))?;
        }
        if let Some(raw) = self.sort {
            filter.sort = SortOrder::from_str(&raw)
                .ok_or_else(|| ApiError::bad_request(format!("unknown sort: {raw}")))?;
        }
        if filter.limit > IncidentFilter::MAX_LIMIT {
            return Err(ApiError::bad_request(format!(
                "limit must be at most {}",
                IncidentFilter::MAX_LIMIT
            )));
        }

        Ok(filter)
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    org: OrgContext,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<IncidentResponse>>, ApiError> {
    let scope = org.scope(&user);
    let filter = query.into_filter()?;
    let incidents = state.incidents.list(&filter, &scope).await?;
    Ok(Json(incidents.into_iter().map(IncidentResponse::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct CreateIncidentRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub urgency: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    /// Foreign keys arrive as strings; empty strings mean "absent".
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub escalation_policy_id: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub incident_key: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub custom_fields: HashMap<String, serde_json::Value>,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    org: OrgContext,
    Json(request): Json<CreateIncidentRequest>,
) -> Result<Json<IncidentResponse>, ApiError> {
    let source = request.source.unwrap_or_else(|| "manual".to_string());
    let mut incident = Incident::new(org.organization_id, request.title, source);
    incident.project_id = org.project_id;
    incident.description = request.description;
    incident.created_by = Some(user.user_id.to_string());
    incident.incident_key = request.incident_key.filter(|k| !k.is_empty());
    incident.labels = request.labels;
    incident.custom_fields = request.custom_fields;

    if let Some(raw) = request.severity {
        incident.severity = Severity::from_str(&raw)
            .ok_or_else(|| ApiError::bad_request(format!("unknown severity: {raw}")))?;
    }
    incident.urgency = match request.urgency {
        Some(raw) => Urgency::from_str(&raw)
            .ok_or_else(|| ApiError::bad_request(format!("unknown urgency: {raw}")))?,
        None => incident.severity.urgency(),
    };

    incident.service_id = coerce_uuid_field(request.service_id.as_deref())?;
    incident.group_id = coerce_uuid_field(request.group_id.as_deref())?;
    incident.escalation_policy_id = coerce_uuid_field(request.escalation_policy_id.as_deref())?;
    incident.assigned_to = coerce_uuid_field(request.assigned_to.as_deref())?;

    // An external dedup key correlates with an open incident instead of
    // opening a second one.
    if let Some(key) = &incident.incident_key {
        if let Some(existing) = state
            .incidents
            .find_open_by_incident_key(org.organization_id, key)
            .await?
        {
            state.incidents.record_refire(existing.id).await?;
            let refreshed = state.incidents.get(existing.id).await?;
            return Ok(Json(refreshed.into()));
        }
    }

    // Level-1 auto-assignment when a policy is attached and nobody was
    // named explicitly.
    if incident.assigned_to.is_none() {
        if let Some(policy_id) = incident.escalation_policy_id {
            let assignee = state
                .escalations
                .resolve_level_assignee(policy_id, incident.group_id, 1, Utc::now())
                .await?;
            if let Some(user_id) = assignee {
                incident.assigned_to = Some(user_id);
                incident.assigned_at = Some(Utc::now());
            }
        }
    }

    let created = state.incidents.create(incident).await?;
    Ok(Json(created.into()))
}

/// Load an incident and verify the caller may touch it: group membership
/// when the incident belongs to a group, project access when it only
/// belongs to a project, org membership otherwise.
async fn load_checked(
    state: &AppState,
    user_id: Uuid,
    incident_id: Uuid,
) -> Result<Incident, ApiError> {
    let incident = state.incidents.get(incident_id).await?;
    match (incident.group_id, incident.project_id) {
        (Some(group_id), _) => {
            state
                .access
                .require_access(user_id, ResourceType::Group, group_id, incident.organization_id)
                .await?;
        }
        (None, Some(project_id)) => {
            state
                .access
                .require_access(
                    user_id,
                    ResourceType::Project,
                    project_id,
                    incident.organization_id,
                )
                .await?;
        }
        (None, None) => {
            state.access.require_org_member(user_id, incident.organization_id).await?;
        }
    }
    Ok(incident)
}

pub async fn get_one(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<IncidentResponse>, ApiError> {
    let incident = load_checked(&state, user.user_id, id).await?;
    Ok(Json(incident.into()))
}

pub async fn acknowledge(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<IncidentResponse>, ApiError> {
    load_checked(&state, user.user_id, id).await?;
    let incident = state.incidents.acknowledge(id, user.user_id).await?;
    Ok(Json(incident.into()))
}

#[derive(Debug, Default, Deserialize)]
pub struct ResolveRequest {
    #[serde(default)]
    pub note: Option<String>,
}

pub async fn resolve(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
    body: Option<Json<ResolveRequest>>,
) -> Result<Json<IncidentResponse>, ApiError> {
    load_checked(&state, user.user_id, id).await?;
    let note = body.and_then(|Json(b)| b.note);
    let incident = state.incidents.resolve(id, user.user_id, note).await?;
    Ok(Json(incident.into()))
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub assigned_to: Uuid,
}

pub async fn assign(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<IncidentResponse>, ApiError> {
    load_checked(&state, user.user_id, id).await?;
    let incident = state
        .incidents
        .assign(id, request.assigned_to, Some(user.user_id))
        .await?;
    Ok(Json(incident.into()))
}

pub async fn escalate(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
) -> Result<Json<IncidentResponse>, ApiError> {
    load_checked(&state, user.user_id, id).await?;
    let incident = state.incidents.escalate_manual(id, Utc::now()).await?;
    Ok(Json(incident.into()))
}

#[derive(Debug, Deserialize)]
pub struct NoteRequest {
    pub note: String,
}

pub async fn note(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
    Json(request): Json<NoteRequest>,
) -> Result<Json<EventResponse>, ApiError> {
    load_checked(&state, user.user_id, id).await?;
    let event = state
        .incidents
        .add_note(id, user.user_id.to_string(), request.note)
        .await?;
    Ok(Json(event.into()))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default = "default_events_limit")]
    pub limit: u32,
}

fn default_events_limit() -> u32 {
    50
}

pub async fn events(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    Path(id): Path<Uuid>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<EventResponse>>, ApiError> {
    if query.limit > 100 {
        return Err(ApiError::bad_request("limit must be at most 100"));
    }
    load_checked(&state, user.user_id, id).await?;
    let events = state.incidents.list_events(id, query.limit).await?;
    Ok(Json(events.into_iter().map(EventResponse::from).collect()))
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total: u64,
    pub triggered: u64,
    pub acknowledged: u64,
    pub resolved: u64,
    pub by_severity: HashMap<String, u64>,
    pub mean_seconds_to_acknowledge: Option<f64>,
    pub mean_seconds_to_resolve: Option<f64>,
    pub window_start: String,
}

pub async fn stats(
    State(state): State<Arc<AppState>>,
    AuthContext(user): AuthContext,
    org: OrgContext,
) -> Result<Json<StatsResponse>, ApiError> {
    let scope = org.scope(&user);
    let since: DateTime<Utc> = Utc::now() - Duration::days(30);
    let stats: IncidentStats = state.incidents.stats(&scope, since).await?;
    Ok(Json(StatsResponse {
        total: stats.total,
        triggered: stats.triggered,
        acknowledged: stats.acknowledged,
        resolved: stats.resolved,
        by_severity: stats.by_severity,
        mean_seconds_to_acknowledge: stats.mean_seconds_to_acknowledge,
        mean_seconds_to_resolve: stats.mean_seconds_to_resolve,
        window_start: since.to_rfc3339(),
    }))
}
