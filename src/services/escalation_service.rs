//! Escalation policy service: level lookups and assignee resolution.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{
    validate_levels, EscalationLevel, EscalationPolicy, EscalationTarget, ScopeFilter,
};
use crate::domain::ports::{EscalationRepository, OnCallScope, ScheduleRepository};

pub struct EscalationService {
    policies: Arc<dyn EscalationRepository>,
    schedules: Arc<dyn ScheduleRepository>,
}

impl EscalationService {
    pub fn new(
        policies: Arc<dyn EscalationRepository>,
        schedules: Arc<dyn ScheduleRepository>,
    ) -> Self {
        Self { policies, schedules }
    }

    pub async fn create_policy(
        &self,
        policy: EscalationPolicy,
        levels: Vec<EscalationLevel>,
    ) -> CoreResult<EscalationPolicy> {
        validate_levels(&levels).map_err(CoreError::ValidationFailed)?;
        self.policies.create_policy_with_levels(&policy, &levels).await?;
        Ok(policy)
    }

    pub async fn get_policy(&self, id: Uuid) -> CoreResult<EscalationPolicy> {
        self.policies
            .get_policy(id)
            .await?
            .ok_or_else(|| CoreError::not_found("escalation policy", id))
    }

    pub async fn list_policies(&self, scope: &ScopeFilter) -> CoreResult<Vec<EscalationPolicy>> {
        self.policies.list_policies(scope).await
    }

    pub async fn list_levels(&self, policy_id: Uuid) -> CoreResult<Vec<EscalationLevel>> {
        self.policies.list_levels(policy_id).await
    }

    pub async fn replace_levels(
        &self,
        policy_id: Uuid,
        levels: Vec<EscalationLevel>,
    ) -> CoreResult<Vec<EscalationLevel>> {
        validate_levels(&levels).map_err(CoreError::ValidationFailed)?;
        self.get_policy(policy_id).await?;
        self.policies.replace_levels(policy_id, &levels).await?;
        Ok(levels)
    }

    pub async fn delete_policy(&self, id: Uuid) -> CoreResult<()> {
        self.policies.delete_policy(id).await
    }

    pub async fn get_level(
        &self,
        policy_id: Uuid,
        level_number: u32,
    ) -> CoreResult<Option<EscalationLevel>> {
        self.policies.get_level(policy_id, level_number).await
    }

    /// Resolve the user a target points at, at instant `at`.
    ///
    /// Empty on-call (no coverage) resolves to `None`, not an error; the
    /// caller decides whether that blocks the operation.
    pub async fn resolve_assignee(
        &self,
        target: EscalationTarget,
        group_id: Option<Uuid>,
        at: DateTime<Utc>,
    ) -> CoreResult<Option<Uuid>> {
        match target {
            EscalationTarget::User(user_id) => Ok(Some(user_id)),
            EscalationTarget::Scheduler(scheduler_id) => {
                let row = self.schedules.effective_at(OnCallScope::Scheduler(scheduler_id), at).await?;
                Ok(row.map(|r| r.effective_user_id))
            }
            EscalationTarget::Group(target_group) => {
                // Target group first, then the incident's own group.
                if let Some(row) =
                    self.schedules.effective_at(OnCallScope::Group(target_group), at).await?
                {
                    return Ok(Some(row.effective_user_id));
                }
                match group_id {
                    Some(own_group) if own_group != target_group => {
                        let row =
                            self.schedules.effective_at(OnCallScope::Group(own_group), at).await?;
                        Ok(row.map(|r| r.effective_user_id))
                    }
                    _ => Ok(None),
                }
            }
            EscalationTarget::CurrentSchedule => {
                let Some(own_group) = group_id else {
                    return Ok(None);
                };
                let row = self.schedules.effective_at(OnCallScope::Group(own_group), at).await?;
                Ok(row.map(|r| r.effective_user_id))
            }
            EscalationTarget::External(_) => Ok(None),
        }
    }

    /// Level-N assignee for a policy, used for level-1 auto-assignment at
    /// incident creation and for escalation advances.
    pub async fn resolve_level_assignee(
        &self,
        policy_id: Uuid,
        group_id: Option<Uuid>,
        level_number: u32,
        at: DateTime<Utc>,
    ) -> CoreResult<Option<Uuid>> {
        let Some(level) = self.policies.get_level(policy_id, level_number).await? else {
            return Ok(None);
        };
        self.resolve_assignee(level.target, group_id, at).await
    }
}
