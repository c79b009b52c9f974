//! Integration routing: which service does an alert belong to.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{HealthStatus, Integration, ProcessedAlert, Service};
use crate::domain::ports::{IntegrationRepository, ServiceRepository};

pub struct RoutingService {
    integrations: Arc<dyn IntegrationRepository>,
    services: Arc<dyn ServiceRepository>,
}

impl RoutingService {
    pub fn new(
        integrations: Arc<dyn IntegrationRepository>,
        services: Arc<dyn ServiceRepository>,
    ) -> Self {
        Self { integrations, services }
    }

    pub async fn get_integration(&self, id: Uuid) -> CoreResult<Integration> {
        self.integrations
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("integration", id))
    }

    /// Stamp the heartbeat. Returns false when the integration is missing or
    /// inactive.
    pub async fn heartbeat(&self, integration_id: Uuid) -> CoreResult<bool> {
        self.integrations.update_heartbeat(integration_id, Utc::now()).await
    }

    /// Heartbeat-derived health for an integration.
    pub async fn health(&self, integration_id: Uuid) -> CoreResult<HealthStatus> {
        let integration = self.get_integration(integration_id).await?;
        Ok(integration.health(Utc::now()))
    }

    /// First service whose routing conditions accept the alert, walking the
    /// integration's links in ascending priority order. Inactive services
    /// are skipped.
    pub async fn resolve_service(
        &self,
        integration_id: Uuid,
        alert: &ProcessedAlert,
    ) -> CoreResult<Option<Service>> {
        let links = self.integrations.list_links(integration_id).await?;

        for link in links {
            if !link.routing_conditions.matches(alert) {
                continue;
            }
            match self.services.get(link.service_id).await? {
                Some(service) if service.is_active => return Ok(Some(service)),
                Some(_) | None => {
                    tracing::debug!(
                        service_id = %link.service_id,
                        integration_id = %integration_id,
                        "matched service is missing or inactive; trying next link"
                    );
                }
            }
        }

        Ok(None)
    }
}
