//! Webhook ingestion pipeline.
//!
//! `POST /webhook/{type}/{integration_id}` lands here: authenticate the
//! integration, stamp its heartbeat, normalize the vendor payload into
//! `ProcessedAlert`s, and route each alert through service resolution into
//! the incident store. Per-alert failures are logged and never fail the
//! batch.

pub mod aws;
pub mod datadog;
pub mod generic;
pub mod grafana;
pub mod prometheus;

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{
    Incident, Integration, IntegrationType, ProcessedAlert, FINGERPRINT_LABEL,
};
use crate::domain::ports::{IncidentRepository, IntegrationRepository, UserRepository};

use super::escalation_service::EscalationService;
use super::incident_service::IncidentService;
use super::routing_service::RoutingService;

/// Dispatch to the vendor-specific normalizer.
pub fn normalize(
    integration_type: IntegrationType,
    payload: &Value,
) -> CoreResult<Vec<ProcessedAlert>> {
    match integration_type {
        IntegrationType::Prometheus => prometheus::normalize(payload),
        IntegrationType::Datadog => datadog::normalize(payload),
        IntegrationType::Grafana => grafana::normalize(payload),
        IntegrationType::Aws => aws::normalize(payload),
        IntegrationType::Webhook | IntegrationType::Custom => generic::normalize(payload),
    }
}

/// Summary returned to the sender.
#[derive(Debug, Clone)]
pub struct IngestReport {
    pub alerts_count: usize,
    pub integration_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

pub struct IngestPipeline {
    integrations: Arc<dyn IntegrationRepository>,
    incident_repo: Arc<dyn IncidentRepository>,
    users: Arc<dyn UserRepository>,
    routing: Arc<RoutingService>,
    escalations: Arc<EscalationService>,
    incidents: Arc<IncidentService>,
    /// When set, a firing payload whose fingerprint matches an open incident
    /// increments that incident instead of opening a new one.
    fingerprint_dedup: bool,
}

impl IngestPipeline {
    pub fn new(
        integrations: Arc<dyn IntegrationRepository>,
        incident_repo: Arc<dyn IncidentRepository>,
        users: Arc<dyn UserRepository>,
        routing: Arc<RoutingService>,
        escalations: Arc<EscalationService>,
        incidents: Arc<IncidentService>,
        fingerprint_dedup: bool,
    ) -> Self {
        Self {
            integrations,
            incident_repo,
            users,
            routing,
            escalations,
            incidents,
            fingerprint_dedup,
        }
    }

    /// The full ingestion path for one webhook call.
    pub async fn handle_webhook(
        &self,
        type_str: &str,
        integration_id: Uuid,
        payload: &Value,
    ) -> CoreResult<IngestReport> {
        let requested = IntegrationType::from_str(type_str).ok_or_else(|| {
            CoreError::ValidationFailed(format!("unknown integration type: {type_str}"))
        })?;

        let integration = self
            .integrations
            .get(integration_id)
            .await?
            .ok_or_else(|| CoreError::not_found("integration", integration_id))?;
        if !integration.is_active {
            return Err(CoreError::Forbidden(format!(
                "integration {integration_id} is inactive"
            )));
        }
        if integration.integration_type != requested {
            return Err(CoreError::ValidationFailed(format!(
                "integration {integration_id} is of type {}, not {type_str}",
                integration.integration_type.as_str()
            )));
        }

        // Heartbeat is best-effort; a failure must not drop the alerts.
        if let Err(e) = self.integrations.update_heartbeat(integration.id, Utc::now()).await {
            tracing::warn!(
                integration_id = %integration.id,
                error = %e,
                "failed to stamp integration heartbeat"
            );
        }

        let alerts = normalize(requested, payload)?;

        for alert in &alerts {
            if let Err(e) = self.route_alert(&integration, alert).await {
                tracing::warn!(
                    integration_id = %integration.id,
                    alert_name = %alert.alert_name,
                    error = %e,
                    "failed to process alert"
                );
            }
        }

        Ok(IngestReport {
            alerts_count: alerts.len(),
            integration_id: integration.id,
            timestamp: Utc::now(),
        })
    }

    async fn route_alert(
        &self,
        integration: &Integration,
        alert: &ProcessedAlert,
    ) -> CoreResult<()> {
        if alert.status.is_firing() {
            self.handle_firing(integration, alert).await
        } else {
            self.handle_resolved(integration, alert).await
        }
    }

    async fn handle_firing(
        &self,
        integration: &Integration,
        alert: &ProcessedAlert,
    ) -> CoreResult<()> {
        let fingerprint = alert.fingerprint();
        let now = Utc::now();

        if self.fingerprint_dedup {
            if let Some(existing) = self
                .incident_repo
                .find_open_by_fingerprint(integration.organization_id, &fingerprint)
                .await?
            {
                tracing::debug!(
                    incident_id = %existing.id,
                    fingerprint = %fingerprint,
                    "refire correlated to open incident"
                );
                return self.incident_repo.record_refire(existing.id, now).await;
            }
        }

        // Service and assignee resolution are both non-fatal: an incident
        // without a service is still an incident.
        let service = match self.routing.resolve_service(integration.id, alert).await {
            Ok(service) => service,
            Err(e) => {
                tracing::warn!(
                    integration_id = %integration.id,
                    error = %e,
                    "service resolution failed; creating unrouted incident"
                );
                None
            }
        };

        let mut assignee = None;
        if let Some(service) = &service {
            if let Some(policy_id) = service.escalation_policy_id {
                match self
                    .escalations
                    .resolve_level_assignee(policy_id, Some(service.group_id), 1, now)
                    .await
                {
                    Ok(resolved) => assignee = resolved,
                    Err(e) => {
                        tracing::warn!(
                            service_id = %service.id,
                            error = %e,
                            "level-1 assignee resolution failed"
                        );
                    }
                }
            }
        }

        let source = integration.integration_type.as_str();
        let mut incident =
            Incident::new(integration.organization_id, alert.title(), source);
        incident.description = alert.incident_description().to_string();
        incident.severity = alert.severity;
        incident.urgency = alert.severity.urgency();
        incident.labels = alert.labels.clone();
        incident.labels.insert(FINGERPRINT_LABEL.to_string(), fingerprint);
        incident.created_by = Some(format!("system:{source}"));
        incident.project_id = integration.project_id;

        if let Some(service) = &service {
            incident.service_id = Some(service.id);
            incident.group_id = Some(service.group_id);
            incident.escalation_policy_id = service.escalation_policy_id;
            if service.project_id.is_some() {
                incident.project_id = service.project_id;
            }
        }
        if let Some(user) = assignee {
            incident.assigned_to = Some(user);
            incident.assigned_at = Some(now);
        }

        self.incidents.create(incident).await?;
        Ok(())
    }

    async fn handle_resolved(
        &self,
        integration: &Integration,
        alert: &ProcessedAlert,
    ) -> CoreResult<()> {
        let org = integration.organization_id;
        let fingerprint = alert.fingerprint();

        // Match order: fingerprint, then label identity, then exact title.
        let mut found = self
            .incident_repo
            .find_open_by_fingerprint(org, &fingerprint)
            .await?;

        if found.is_none() {
            if let Some(instance) = alert.label("instance") {
                found = self
                    .incident_repo
                    .find_open_by_labels(org, &alert.alert_name, instance, alert.label("job"))
                    .await?;
            }
        }
        if found.is_none() {
            found = self.incident_repo.find_open_by_title(org, alert.title()).await?;
        }

        let Some(incident) = found else {
            // Resolves may arrive for alerts we never saw fire.
            tracing::info!(
                integration_id = %integration.id,
                fingerprint = %fingerprint,
                alert_name = %alert.alert_name,
                "no open incident matched resolve payload; dropping"
            );
            return Ok(());
        };

        let source = integration.integration_type.as_str();
        let system_user = self.users.ensure_system_user(source).await?;
        self.incidents
            .resolve(
                incident.id,
                system_user.id,
                Some(format!("Auto-resolved by {source}")),
            )
            .await?;
        Ok(())
    }
}
