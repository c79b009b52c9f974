//! Schedule repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::CoreResult;
use crate::domain::models::{
    EffectiveShift, ScheduleOverride, Scheduler, ScopeFilter, Shift,
};

/// Scope of an effective on-call lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnCallScope {
    Group(Uuid),
    Scheduler(Uuid),
    Service(Uuid),
}

impl OnCallScope {
    pub fn describe(&self) -> String {
        match self {
            Self::Group(id) => format!("group {id}"),
            Self::Scheduler(id) => format!("scheduler {id}"),
            Self::Service(id) => format!("service {id}"),
        }
    }
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    /// Insert a scheduler together with its initial shift set. The whole
    /// tuple commits or none of it does.
    async fn create_scheduler_with_shifts(
        &self,
        scheduler: &Scheduler,
        shifts: &[Shift],
    ) -> CoreResult<()>;

    async fn get_scheduler(&self, id: Uuid) -> CoreResult<Option<Scheduler>>;

    /// Lookup among a group's active schedulers.
    async fn find_scheduler_by_name(
        &self,
        group_id: Uuid,
        name: &str,
    ) -> CoreResult<Option<Scheduler>>;

    async fn list_schedulers(&self, scope: &ScopeFilter) -> CoreResult<Vec<Scheduler>>;

    async fn deactivate_scheduler(&self, id: Uuid) -> CoreResult<()>;

    /// Replace a scheduler's shift set: soft-deactivate current shifts and
    /// batch-insert the new ones in one transaction.
    async fn replace_shifts(&self, scheduler_id: Uuid, shifts: &[Shift]) -> CoreResult<()>;

    /// Active shifts for a scheduler, ordered by start time.
    async fn list_shifts(&self, scheduler_id: Uuid) -> CoreResult<Vec<Shift>>;

    async fn get_shift(&self, id: Uuid) -> CoreResult<Option<Shift>>;

    async fn create_override(&self, ov: &ScheduleOverride) -> CoreResult<()>;

    async fn get_override(&self, id: Uuid) -> CoreResult<Option<ScheduleOverride>>;

    async fn get_override_for_shift(&self, shift_id: Uuid)
        -> CoreResult<Option<ScheduleOverride>>;

    async fn delete_override(&self, id: Uuid) -> CoreResult<()>;

    /// The single effective-shift row covering `at` for the scope, if any.
    async fn effective_at(
        &self,
        scope: OnCallScope,
        at: DateTime<Utc>,
    ) -> CoreResult<Option<EffectiveShift>>;
}
