//! Group repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::CoreResult;
use crate::domain::models::{Group, ScopeFilter};

#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn create(&self, group: &Group) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Group>>;

    async fn update(&self, group: &Group) -> CoreResult<()>;

    /// Active groups visible under the scope.
    async fn list(&self, scope: &ScopeFilter) -> CoreResult<Vec<Group>>;

    /// Soft delete.
    async fn deactivate(&self, id: Uuid) -> CoreResult<()>;
}
