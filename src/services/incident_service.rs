//! Incident service: atomic creation, lifecycle transitions, and escalation
//! advances.
//!
//! Every state change persists the incident row, its audit events, and any
//! queued notifications in one repository transaction. Notification enqueue
//! failures therefore cannot outrun the incident they describe.

use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{
    EscalationStatus, Incident, IncidentEvent, IncidentEventType, IncidentStatus,
    NotificationMessage, NotificationType, ScopeFilter,
};
use crate::domain::ports::{IncidentFilter, IncidentRepository, IncidentStats, UserRepository};

use super::escalation_service::EscalationService;

/// Foreign keys arrive from the edge as strings; an empty string means
/// "absent" and must never be parsed as a UUID.
pub fn coerce_uuid_field(value: Option<&str>) -> CoreResult<Option<Uuid>> {
    match value {
        None => Ok(None),
        Some("") => Ok(None),
        Some(s) => Uuid::parse_str(s)
            .map(Some)
            .map_err(|_| CoreError::ValidationFailed(format!("invalid uuid: {s}"))),
    }
}

/// What an escalation advance did.
#[derive(Debug, Clone, PartialEq)]
pub enum EscalationOutcome {
    /// Moved to `level`, optionally reassigning.
    Advanced { level: u32, assignee: Option<Uuid> },
    /// No further level existed; escalation marked completed.
    Exhausted,
}

pub struct IncidentService {
    incidents: Arc<dyn IncidentRepository>,
    users: Arc<dyn UserRepository>,
    escalations: Arc<EscalationService>,
}

impl IncidentService {
    pub fn new(
        incidents: Arc<dyn IncidentRepository>,
        users: Arc<dyn UserRepository>,
        escalations: Arc<EscalationService>,
    ) -> Self {
        Self { incidents, users, escalations }
    }

    async fn user_name(&self, id: Uuid) -> String {
        match self.users.get(id).await {
            Ok(Some(user)) => user.name,
            _ => id.to_string(),
        }
    }

    /// Create a fully resolved incident atomically: row, `triggered` event,
    /// and (when assigned) the `assigned` event plus its notification.
    pub async fn create(&self, mut incident: Incident) -> CoreResult<Incident> {
        incident.status = IncidentStatus::Triggered;
        incident.escalation_status = EscalationStatus::None;
        incident.current_escalation_level = 1;
        if incident.alert_count == 0 {
            incident.alert_count = 1;
        }
        incident.validate().map_err(CoreError::ValidationFailed)?;

        let actor = incident
            .created_by
            .clone()
            .unwrap_or_else(|| incident.source.clone());

        let mut events = vec![IncidentEvent::new(incident.id, IncidentEventType::Triggered)
            .with_data(json!({
                "title": incident.title,
                "severity": incident.severity.as_str(),
                "source": incident.source,
            }))
            .by(actor.clone())];

        let mut notifications = Vec::new();
        if let Some(assignee) = incident.assigned_to {
            if incident.assigned_at.is_none() {
                incident.assigned_at = Some(incident.created_at);
            }
            let name = self.user_name(assignee).await;
            events.push(
                IncidentEvent::new(incident.id, IncidentEventType::Assigned)
                    .with_data(json!({
                        "assigned_to": assignee,
                        "assigned_to_name": name,
                    }))
                    .by(actor),
            );
            notifications.push(NotificationMessage::for_event(
                NotificationType::Assigned,
                assignee,
                incident.id,
            ));
        }

        self.incidents.create_atomic(&incident, &events, &notifications).await?;
        Ok(incident)
    }

    pub async fn get(&self, id: Uuid) -> CoreResult<Incident> {
        self.incidents.get(id).await?.ok_or_else(|| CoreError::not_found("incident", id))
    }

    pub async fn list(
        &self,
        filter: &IncidentFilter,
        scope: &ScopeFilter,
    ) -> CoreResult<Vec<Incident>> {
        self.incidents.list(filter, scope).await
    }

    pub async fn list_events(
        &self,
        incident_id: Uuid,
        limit: u32,
    ) -> CoreResult<Vec<IncidentEvent>> {
        self.get(incident_id).await?;
        self.incidents.list_events(incident_id, limit).await
    }

    pub async fn stats(&self, scope: &ScopeFilter, since: DateTime<Utc>) -> CoreResult<IncidentStats> {
        self.incidents.stats(scope, since).await
    }

    pub async fn find_open_by_fingerprint(
        &self,
        organization_id: Uuid,
        fingerprint: &str,
    ) -> CoreResult<Option<Incident>> {
        self.incidents.find_open_by_fingerprint(organization_id, fingerprint).await
    }

    pub async fn find_open_by_incident_key(
        &self,
        organization_id: Uuid,
        incident_key: &str,
    ) -> CoreResult<Option<Incident>> {
        self.incidents.find_open_by_incident_key(organization_id, incident_key).await
    }

    /// Correlated refire of an existing open incident.
    pub async fn record_refire(&self, id: Uuid) -> CoreResult<()> {
        self.incidents.record_refire(id, Utc::now()).await
    }

    /// Acknowledge. Re-acknowledging is a no-op: no event, no notification.
    pub async fn acknowledge(&self, id: Uuid, by: Uuid) -> CoreResult<Incident> {
        let mut incident = self.get(id).await?;
        let now = Utc::now();

        let changed = incident.acknowledge(by, now).map_err(CoreError::ConflictState)?;
        if !changed {
            return Ok(incident);
        }

        let name = self.user_name(by).await;
        let events = vec![IncidentEvent::new(incident.id, IncidentEventType::Acknowledged)
            .with_data(json!({ "acknowledged_by": by, "acknowledged_by_name": name }))
            .by(by.to_string())];

        let recipient = incident.assigned_to.unwrap_or(by);
        let notifications = vec![NotificationMessage::for_event(
            NotificationType::Acknowledged,
            recipient,
            incident.id,
        )];

        self.incidents.update_with_events(&incident, &events, &notifications).await?;
        Ok(incident)
    }

    /// Resolve from any open state.
    pub async fn resolve(
        &self,
        id: Uuid,
        by: Uuid,
        note: Option<String>,
    ) -> CoreResult<Incident> {
        let mut incident = self.get(id).await?;
        let now = Utc::now();

        incident.resolve(by, now).map_err(CoreError::ConflictState)?;

        let name = self.user_name(by).await;
        let mut data = json!({ "resolved_by": by, "resolved_by_name": name });
        if let Some(note) = &note {
            data["note"] = json!(note);
        }
        let events = vec![IncidentEvent::new(incident.id, IncidentEventType::Resolved)
            .with_data(data)
            .by(by.to_string())];

        let recipient = incident.assigned_to.unwrap_or(by);
        let notifications = vec![NotificationMessage::for_event(
            NotificationType::Resolved,
            recipient,
            incident.id,
        )];

        self.incidents.update_with_events(&incident, &events, &notifications).await?;
        Ok(incident)
    }

    /// Reassign. Status is untouched.
    pub async fn assign(&self, id: Uuid, to: Uuid, actor: Option<Uuid>) -> CoreResult<Incident> {
        let mut incident = self.get(id).await?;
        let now = Utc::now();

        incident.assign(to, now);

        let name = self.user_name(to).await;
        let actor_str = actor.map(|a| a.to_string()).unwrap_or_else(|| "system".to_string());
        let events = vec![IncidentEvent::new(incident.id, IncidentEventType::Assigned)
            .with_data(json!({ "assigned_to": to, "assigned_to_name": name }))
            .by(actor_str)];

        let notifications = vec![NotificationMessage::for_event(
            NotificationType::Assigned,
            to,
            incident.id,
        )];

        self.incidents.update_with_events(&incident, &events, &notifications).await?;
        Ok(incident)
    }

    /// Append a free-form note to the audit stream.
    pub async fn add_note(
        &self,
        id: Uuid,
        actor: impl Into<String>,
        text: String,
    ) -> CoreResult<IncidentEvent> {
        self.get(id).await?;
        let event = IncidentEvent::new(id, IncidentEventType::Note)
            .with_data(json!({ "note": text }))
            .by(actor);
        self.incidents.append_event(&event).await?;
        Ok(event)
    }

    /// User-initiated escalation. A missing next level is a conflict.
    pub async fn escalate_manual(&self, id: Uuid, at: DateTime<Utc>) -> CoreResult<Incident> {
        let incident = self.get(id).await?;
        let (incident, _) = self.advance(incident, at, true).await?;
        Ok(incident)
    }

    /// Timer-driven escalation. A missing next level completes the policy
    /// instead of failing.
    pub async fn escalate_auto(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> CoreResult<EscalationOutcome> {
        let incident = self.get(id).await?;
        let (_, outcome) = self.advance(incident, at, false).await?;
        Ok(outcome)
    }

    async fn advance(
        &self,
        mut incident: Incident,
        at: DateTime<Utc>,
        strict: bool,
    ) -> CoreResult<(Incident, EscalationOutcome)> {
        if incident.status == IncidentStatus::Resolved {
            return Err(CoreError::ConflictState(
                "cannot escalate a resolved incident".to_string(),
            ));
        }
        let Some(policy_id) = incident.escalation_policy_id else {
            return Err(CoreError::ConflictState(
                "incident has no escalation policy".to_string(),
            ));
        };

        let next_number = incident.current_escalation_level + 1;
        let Some(level) = self.escalations.get_level(policy_id, next_number).await? else {
            if strict {
                return Err(CoreError::ConflictState(format!(
                    "no escalation level {next_number} in policy {policy_id}"
                )));
            }
            incident.escalation_status = EscalationStatus::Completed;
            incident.updated_at = at;
            let events =
                vec![IncidentEvent::new(incident.id, IncidentEventType::EscalationCompleted)
                    .with_data(json!({ "final_level": incident.current_escalation_level }))
                    .by("escalation-timer")];
            self.incidents.update_with_events(&incident, &events, &[]).await?;
            return Ok((incident, EscalationOutcome::Exhausted));
        };

        let assignee = self
            .escalations
            .resolve_assignee(level.target, incident.group_id, at)
            .await?;

        let has_further =
            self.escalations.get_level(policy_id, next_number + 1).await?.is_some();

        incident.current_escalation_level = next_number;
        incident.last_escalated_at = Some(at);
        incident.escalation_status = if has_further {
            EscalationStatus::Pending
        } else {
            EscalationStatus::Completed
        };
        if let Some(user) = assignee {
            incident.assign(user, at);
        }
        incident.updated_at = at;

        let mut events = vec![IncidentEvent::new(incident.id, IncidentEventType::Escalated)
            .with_data(json!({
                "level": next_number,
                "target_type": level.target.target_type(),
                "assigned_to": assignee,
            }))];
        if !has_further {
            events.push(
                IncidentEvent::new(incident.id, IncidentEventType::EscalationCompleted)
                    .with_data(json!({ "final_level": next_number })),
            );
        }

        let notifications = match assignee {
            Some(user) => vec![NotificationMessage::for_event(
                NotificationType::Escalated,
                user,
                incident.id,
            )],
            None => {
                tracing::debug!(
                    incident_id = %incident.id,
                    level = next_number,
                    target = level.target.target_type(),
                    "escalation level resolved to no user; skipping notification"
                );
                Vec::new()
            }
        };

        self.incidents.update_with_events(&incident, &events, &notifications).await?;
        Ok((incident, EscalationOutcome::Advanced { level: next_number, assignee }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_uuid_field() {
        assert_eq!(coerce_uuid_field(None).unwrap(), None);
        assert_eq!(coerce_uuid_field(Some("")).unwrap(), None);

        let id = Uuid::new_v4();
        assert_eq!(coerce_uuid_field(Some(&id.to_string())).unwrap(), Some(id));

        assert!(coerce_uuid_field(Some("not-a-uuid")).is_err());
    }
}
