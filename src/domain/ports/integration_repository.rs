//! Integration repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::CoreResult;
use crate::domain::models::{Integration, ScopeFilter, ServiceIntegration};

#[async_trait]
pub trait IntegrationRepository: Send + Sync {
    async fn create(&self, integration: &Integration) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Integration>>;

    async fn update(&self, integration: &Integration) -> CoreResult<()>;

    async fn list(&self, scope: &ScopeFilter) -> CoreResult<Vec<Integration>>;

    /// Soft delete.
    async fn deactivate(&self, id: Uuid) -> CoreResult<()>;

    /// Stamp `last_heartbeat` if the integration is active. Returns whether
    /// a row was updated.
    async fn update_heartbeat(&self, id: Uuid, at: DateTime<Utc>) -> CoreResult<bool>;

    /// Attach a service with routing conditions.
    async fn link_service(&self, link: &ServiceIntegration) -> CoreResult<()>;

    async fn unlink_service(&self, service_id: Uuid, integration_id: Uuid) -> CoreResult<()>;

    /// Join rows for an integration, ordered by ascending priority.
    async fn list_links(&self, integration_id: Uuid) -> CoreResult<Vec<ServiceIntegration>>;
}
