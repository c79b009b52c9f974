//! Escalation policy repository port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::CoreResult;
use crate::domain::models::{EscalationLevel, EscalationPolicy, ScopeFilter};

#[async_trait]
pub trait EscalationRepository: Send + Sync {
    /// Insert a policy with its ordered levels in one transaction.
    async fn create_policy_with_levels(
        &self,
        policy: &EscalationPolicy,
        levels: &[EscalationLevel],
    ) -> CoreResult<()>;

    async fn get_policy(&self, id: Uuid) -> CoreResult<Option<EscalationPolicy>>;

    async fn list_policies(&self, scope: &ScopeFilter) -> CoreResult<Vec<EscalationPolicy>>;

    /// Levels for a policy, ordered by level number.
    async fn list_levels(&self, policy_id: Uuid) -> CoreResult<Vec<EscalationLevel>>;

    async fn get_level(
        &self,
        policy_id: Uuid,
        level_number: u32,
    ) -> CoreResult<Option<EscalationLevel>>;

    /// Replace a policy's level set in one transaction.
    async fn replace_levels(
        &self,
        policy_id: Uuid,
        levels: &[EscalationLevel],
    ) -> CoreResult<()>;

    async fn delete_policy(&self, id: Uuid) -> CoreResult<()>;
}
