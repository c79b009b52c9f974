//! ReBAC access checks.
//!
//! A user may access a resource either through a direct membership tuple or,
//! for projects only, through org membership when the project has no direct
//! members (an "open" project). Groups and orgs always require direct
//! membership.

use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::ResourceType;
use crate::domain::ports::MembershipRepository;

pub struct AccessControl {
    memberships: Arc<dyn MembershipRepository>,
}

impl AccessControl {
    pub fn new(memberships: Arc<dyn MembershipRepository>) -> Self {
        Self { memberships }
    }

    /// Whether `user_id` may access the resource.
    pub async fn can_access(
        &self,
        user_id: Uuid,
        resource_type: ResourceType,
        resource_id: Uuid,
        organization_id: Uuid,
    ) -> CoreResult<bool> {
        if self.memberships.get(user_id, resource_type, resource_id).await?.is_some() {
            return Ok(true);
        }

        // Open projects inherit org-level access. Nothing else inherits.
        if resource_type == ResourceType::Project {
            let direct = self.memberships.count_direct(resource_type, resource_id).await?;
            if direct == 0 {
                let org_member = self
                    .memberships
                    .get(user_id, ResourceType::Org, organization_id)
                    .await?;
                return Ok(org_member.is_some());
            }
        }

        Ok(false)
    }

    /// `can_access` that fails with `Forbidden`.
    pub async fn require_access(
        &self,
        user_id: Uuid,
        resource_type: ResourceType,
        resource_id: Uuid,
        organization_id: Uuid,
    ) -> CoreResult<()> {
        if self.can_access(user_id, resource_type, resource_id, organization_id).await? {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "user {user_id} has no access to {} {resource_id}",
                resource_type.as_str()
            )))
        }
    }

    /// Org membership gate used by endpoints that operate on org-level
    /// resources directly.
    pub async fn require_org_member(
        &self,
        user_id: Uuid,
        organization_id: Uuid,
    ) -> CoreResult<()> {
        self.require_access(user_id, ResourceType::Org, organization_id, organization_id).await
    }
}
