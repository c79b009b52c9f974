//! Service repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::CoreResult;
use crate::domain::models::{ScopeFilter, Service};

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    async fn create(&self, service: &Service) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Service>>;

    async fn get_by_routing_key(&self, routing_key: &str) -> CoreResult<Option<Service>>;

    async fn update(&self, service: &Service) -> CoreResult<()>;

    /// Active services visible under the scope.
    async fn list(&self, scope: &ScopeFilter) -> CoreResult<Vec<Service>>;

    /// Soft delete.
    async fn deactivate(&self, id: Uuid) -> CoreResult<()>;
}
