//! Scheduling service: scheduler lifecycle, overrides, and effective on-call
//! lookups.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{
    EffectiveShift, OverrideType, ScheduleOverride, Scheduler, ScopeFilter, Shift,
};
use crate::domain::ports::{OnCallScope, ScheduleRepository};

/// How many suffixed candidates are tried before falling back to a
/// timestamped name.
const MAX_NAME_ATTEMPTS: u32 = 100;

pub struct ScheduleService {
    schedules: Arc<dyn ScheduleRepository>,
}

impl ScheduleService {
    pub fn new(schedules: Arc<dyn ScheduleRepository>) -> Self {
        Self { schedules }
    }

    /// Create a scheduler and its shift set in one transaction. The
    /// scheduler name is made unique within the group by suffixing `-1`,
    /// `-2`, ... and finally a timestamp.
    pub async fn create_scheduler(
        &self,
        mut scheduler: Scheduler,
        mut shifts: Vec<Shift>,
    ) -> CoreResult<Scheduler> {
        if scheduler.name.trim().is_empty() {
            return Err(CoreError::ValidationFailed(
                "scheduler name cannot be empty".to_string(),
            ));
        }
        scheduler.name = self.allocate_name(scheduler.group_id, &scheduler.name).await?;

        for shift in &mut shifts {
            shift.scheduler_id = scheduler.id;
            shift.validate().map_err(CoreError::ValidationFailed)?;
        }

        self.schedules.create_scheduler_with_shifts(&scheduler, &shifts).await?;
        Ok(scheduler)
    }

    async fn allocate_name(&self, group_id: Uuid, base: &str) -> CoreResult<String> {
        if self.schedules.find_scheduler_by_name(group_id, base).await?.is_none() {
            return Ok(base.to_string());
        }
        for n in 1..=MAX_NAME_ATTEMPTS {
            let candidate = format!("{base}-{n}");
            if self.schedules.find_scheduler_by_name(group_id, &candidate).await?.is_none() {
                return Ok(candidate);
            }
        }
        Ok(format!("{base}-{}", Utc::now().timestamp()))
    }

    pub async fn get_scheduler(&self, id: Uuid) -> CoreResult<Scheduler> {
        self.schedules
            .get_scheduler(id)
            .await?
            .ok_or_else(|| CoreError::not_found("scheduler", id))
    }

    pub async fn list_schedulers(&self, scope: &ScopeFilter) -> CoreResult<Vec<Scheduler>> {
        self.schedules.list_schedulers(scope).await
    }

    pub async fn deactivate_scheduler(&self, id: Uuid) -> CoreResult<()> {
        self.schedules.deactivate_scheduler(id).await
    }

    /// Replace the shift set wholesale: previous shifts are deactivated and
    /// the new set inserted in the same transaction.
    pub async fn replace_shifts(
        &self,
        scheduler_id: Uuid,
        mut shifts: Vec<Shift>,
    ) -> CoreResult<Vec<Shift>> {
        let scheduler = self.get_scheduler(scheduler_id).await?;

        for shift in &mut shifts {
            shift.scheduler_id = scheduler.id;
            shift.validate().map_err(CoreError::ValidationFailed)?;
        }

        self.schedules.replace_shifts(scheduler.id, &shifts).await?;
        Ok(shifts)
    }

    pub async fn list_shifts(&self, scheduler_id: Uuid) -> CoreResult<Vec<Shift>> {
        self.schedules.list_shifts(scheduler_id).await
    }

    pub async fn get_shift(&self, id: Uuid) -> CoreResult<Shift> {
        self.schedules.get_shift(id).await?.ok_or_else(|| CoreError::not_found("shift", id))
    }

    pub async fn get_override(&self, id: Uuid) -> CoreResult<ScheduleOverride> {
        self.schedules
            .get_override(id)
            .await?
            .ok_or_else(|| CoreError::not_found("schedule override", id))
    }

    /// Create an override for a shift after validating its window.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_override(
        &self,
        shift_id: Uuid,
        new_user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        override_type: OverrideType,
        reason: String,
        declared_full: bool,
    ) -> CoreResult<ScheduleOverride> {
        let shift = self
            .schedules
            .get_shift(shift_id)
            .await?
            .ok_or_else(|| CoreError::not_found("shift", shift_id))?;

        let mut ov = ScheduleOverride::new(shift_id, new_user_id, start, end);
        ov.override_type = override_type;
        ov.reason = reason;
        ov.validate_against(&shift, declared_full)?;

        self.schedules.create_override(&ov).await?;
        Ok(ov)
    }

    /// Removing an override restores the original assignment for the whole
    /// shift window.
    pub async fn remove_override(&self, id: Uuid) -> CoreResult<()> {
        self.schedules.delete_override(id).await
    }

    pub async fn get_override_for_shift(
        &self,
        shift_id: Uuid,
    ) -> CoreResult<Option<ScheduleOverride>> {
        self.schedules.get_override_for_shift(shift_id).await
    }

    /// Who is on call for the scope at `at`, when coverage exists.
    pub async fn find_on_call(
        &self,
        scope: OnCallScope,
        at: DateTime<Utc>,
    ) -> CoreResult<Option<EffectiveShift>> {
        self.schedules.effective_at(scope, at).await
    }

    /// `find_on_call` that fails with `NoOnCallFound` when nothing covers
    /// `at`.
    pub async fn require_on_call(
        &self,
        scope: OnCallScope,
        at: DateTime<Utc>,
    ) -> CoreResult<EffectiveShift> {
        self.find_on_call(scope, at).await?.ok_or_else(|| CoreError::NoOnCallFound {
            scope: scope.describe(),
            at: at.to_rfc3339(),
        })
    }
}
