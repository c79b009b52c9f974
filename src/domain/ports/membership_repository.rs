//! Membership repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::CoreResult;
use crate::domain::models::{Membership, ResourceType};

/// Persistence interface for ReBAC tuples.
#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Insert a tuple. Duplicate `(user, type, resource)` is a conflict.
    async fn create(&self, membership: &Membership) -> CoreResult<()>;

    /// Remove a tuple.
    async fn delete(
        &self,
        user_id: Uuid,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> CoreResult<()>;

    /// Fetch one tuple.
    async fn get(
        &self,
        user_id: Uuid,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> CoreResult<Option<Membership>>;

    /// All tuples for one resource.
    async fn list_for_resource(
        &self,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> CoreResult<Vec<Membership>>;

    /// All tuples for one user, optionally narrowed by resource type.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        resource_type: Option<ResourceType>,
    ) -> CoreResult<Vec<Membership>>;

    /// Number of direct members on a resource. Zero means an "open" project.
    async fn count_direct(
        &self,
        resource_type: ResourceType,
        resource_id: Uuid,
    ) -> CoreResult<u64>;
}
