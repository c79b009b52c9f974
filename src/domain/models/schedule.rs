//! Scheduling model: rotation containers, shifts, overrides, and the
//! effective-shift projection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationType {
    Manual,
    Daily,
    Weekly,
}

impl Default for RotationType {
    fn default() -> Self {
        Self::Manual
    }
}

impl RotationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "manual" => Some(Self::Manual),
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleScope {
    Group,
    Service,
}

impl Default for ScheduleScope {
    fn default() -> Self {
        Self::Group
    }
}

impl ScheduleScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Service => "service",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "group" => Some(Self::Group),
            "service" => Some(Self::Service),
            _ => None,
        }
    }
}

/// A named rotation container within a group.
///
/// `name` is unique among a group's active schedulers; `display_name` is the
/// free-form label shown to humans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scheduler {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
    pub group_id: Uuid,
    pub name: String,
    pub display_name: String,
    pub rotation_type: RotationType,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Scheduler {
    pub fn new(
        organization_id: Uuid,
        group_id: Uuid,
        name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            project_id: None,
            group_id,
            name: name.into(),
            display_name: display_name.into(),
            rotation_type: RotationType::default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A concrete interval assigning one user for one scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: Uuid,
    pub scheduler_id: Uuid,
    pub user_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub rotation_days: u32,
    pub is_recurring: bool,
    pub service_id: Option<Uuid>,
    pub schedule_scope: ScheduleScope,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shift {
    pub fn new(
        scheduler_id: Uuid,
        user_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            scheduler_id,
            user_id,
            start_time,
            end_time,
            rotation_days: 7,
            is_recurring: false,
            service_id: None,
            schedule_scope: ScheduleScope::default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.start_time >= self.end_time {
            return Err("shift start must precede its end".to_string());
        }
        Ok(())
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start_time <= at && at < self.end_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideType {
    Temporary,
    Permanent,
    Emergency,
}

impl Default for OverrideType {
    fn default() -> Self {
        Self::Temporary
    }
}

impl OverrideType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temporary => "temporary",
            Self::Permanent => "permanent",
            Self::Emergency => "emergency",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "temporary" => Some(Self::Temporary),
            "permanent" => Some(Self::Permanent),
            "emergency" => Some(Self::Emergency),
            _ => None,
        }
    }
}

/// A replacement assignment within a shift's window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleOverride {
    pub id: Uuid,
    pub original_schedule_id: Uuid,
    pub new_user_id: Uuid,
    pub override_start_time: DateTime<Utc>,
    pub override_end_time: DateTime<Utc>,
    pub override_type: OverrideType,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl ScheduleOverride {
    pub fn new(
        shift_id: Uuid,
        new_user_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            original_schedule_id: shift_id,
            new_user_id,
            override_start_time: start,
            override_end_time: end,
            override_type: OverrideType::default(),
            reason: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn covers_full_window(&self, shift: &Shift) -> bool {
        self.override_start_time == shift.start_time && self.override_end_time == shift.end_time
    }

    /// Window validation against the parent shift.
    ///
    /// The window must sit inside the shift. A window equal to the shift's is
    /// a full override and must be declared as such by the caller
    /// (`declared_full`); a "partial" override with the full window is
    /// rejected so the intent stays explicit.
    pub fn validate_against(&self, shift: &Shift, declared_full: bool) -> CoreResult<()> {
        if self.override_start_time >= self.override_end_time {
            return Err(CoreError::ValidationFailed(
                "override start must precede its end".to_string(),
            ));
        }
        if self.override_start_time < shift.start_time || self.override_end_time > shift.end_time {
            return Err(CoreError::ValidationFailed(
                "override window must fall within the shift window".to_string(),
            ));
        }
        if self.covers_full_window(shift) && !declared_full {
            return Err(CoreError::UsePartialOverrideForFullTimes);
        }
        Ok(())
    }
}

/// One row of the effective-shift projection: a sub-interval of a base shift
/// with the user actually on call during it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveShift {
    pub shift_id: Uuid,
    pub scheduler_id: Uuid,
    pub group_id: Uuid,
    pub service_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub effective_user_id: Uuid,
    pub original_user_id: Uuid,
    pub override_id: Option<Uuid>,
}

/// Partition a shift into its effective sub-intervals: pre-override
/// remainder, override window, post-override remainder. Mirrors the
/// `effective_shifts` view so in-process computations and SQL point queries
/// agree.
pub fn effective_intervals(
    shift: &Shift,
    group_id: Uuid,
    ov: Option<&ScheduleOverride>,
) -> Vec<EffectiveShift> {
    let base = |start, end, user, override_id| EffectiveShift {
        shift_id: shift.id,
        scheduler_id: shift.scheduler_id,
        group_id,
        service_id: shift.service_id,
        start_time: start,
        end_time: end,
        effective_user_id: user,
        original_user_id: shift.user_id,
        override_id,
    };

    let Some(ov) = ov else {
        return vec![base(shift.start_time, shift.end_time, shift.user_id, None)];
    };

    let mut rows = Vec::with_capacity(3);
    if shift.start_time < ov.override_start_time {
        rows.push(base(shift.start_time, ov.override_start_time, shift.user_id, None));
    }
    rows.push(base(
        ov.override_start_time,
        ov.override_end_time,
        ov.new_user_id,
        Some(ov.id),
    ));
    if ov.override_end_time < shift.end_time {
        rows.push(base(ov.override_end_time, shift.end_time, shift.user_id, None));
    }
    rows
}

/// Who is effectively on call for a shift at `at`.
pub fn effective_user_at(
    shift: &Shift,
    ov: Option<&ScheduleOverride>,
    at: DateTime<Utc>,
) -> Option<Uuid> {
    if !shift.contains(at) {
        return None;
    }
    if let Some(ov) = ov {
        if ov.override_start_time <= at && at < ov.override_end_time {
            return Some(ov.new_user_id);
        }
    }
    Some(shift.user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn t(s: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap().and_utc()
    }

    fn week_shift() -> Shift {
        Shift::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            t("2025-01-06 00:00"),
            t("2025-01-13 00:00"),
        )
    }

    #[test]
    fn test_shift_window_validation() {
        let mut shift = week_shift();
        assert!(shift.validate().is_ok());
        shift.end_time = shift.start_time;
        assert!(shift.validate().is_err());
    }

    #[test]
    fn test_override_must_fit_shift_window() {
        let shift = week_shift();
        let ov = ScheduleOverride::new(
            shift.id,
            Uuid::new_v4(),
            t("2025-01-05 00:00"),
            t("2025-01-09 00:00"),
        );
        assert!(matches!(
            ov.validate_against(&shift, false),
            Err(CoreError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_partial_override_with_full_window_rejected() {
        let shift = week_shift();
        let ov = ScheduleOverride::new(shift.id, Uuid::new_v4(), shift.start_time, shift.end_time);
        assert!(matches!(
            ov.validate_against(&shift, false),
            Err(CoreError::UsePartialOverrideForFullTimes)
        ));
        // Declared full, the same window is legal.
        assert!(ov.validate_against(&shift, true).is_ok());
    }

    #[test]
    fn test_effective_partition_without_override() {
        let shift = week_shift();
        let rows = effective_intervals(&shift, Uuid::new_v4(), None);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].start_time, shift.start_time);
        assert_eq!(rows[0].end_time, shift.end_time);
        assert_eq!(rows[0].effective_user_id, shift.user_id);
        assert!(rows[0].override_id.is_none());
    }

    #[test]
    fn test_effective_partition_with_interior_override() {
        let shift = week_shift();
        let u2 = Uuid::new_v4();
        let ov = ScheduleOverride::new(
            shift.id,
            u2,
            t("2025-01-08 09:00"),
            t("2025-01-09 17:00"),
        );
        let rows = effective_intervals(&shift, Uuid::new_v4(), Some(&ov));
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].effective_user_id, shift.user_id);
        assert_eq!(rows[1].effective_user_id, u2);
        assert_eq!(rows[1].override_id, Some(ov.id));
        assert_eq!(rows[2].effective_user_id, shift.user_id);

        // Sub-intervals tile the shift window exactly.
        assert_eq!(rows[0].start_time, shift.start_time);
        assert_eq!(rows[0].end_time, rows[1].start_time);
        assert_eq!(rows[1].end_time, rows[2].start_time);
        assert_eq!(rows[2].end_time, shift.end_time);
    }

    #[test]
    fn test_effective_partition_with_leading_override() {
        let shift = week_shift();
        let ov = ScheduleOverride::new(
            shift.id,
            Uuid::new_v4(),
            shift.start_time,
            t("2025-01-08 00:00"),
        );
        let rows = effective_intervals(&shift, Uuid::new_v4(), Some(&ov));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].override_id, Some(ov.id));
        assert_eq!(rows[1].effective_user_id, shift.user_id);
    }

    #[test]
    fn test_effective_user_at_partial_override() {
        let shift = week_shift();
        let u1 = shift.user_id;
        let u2 = Uuid::new_v4();
        let ov = ScheduleOverride::new(
            shift.id,
            u2,
            t("2025-01-08 09:00"),
            t("2025-01-09 17:00"),
        );

        assert_eq!(effective_user_at(&shift, Some(&ov), t("2025-01-07 12:00")), Some(u1));
        assert_eq!(effective_user_at(&shift, Some(&ov), t("2025-01-08 12:00")), Some(u2));
        assert_eq!(effective_user_at(&shift, Some(&ov), t("2025-01-10 00:00")), Some(u1));
        assert_eq!(effective_user_at(&shift, Some(&ov), t("2025-01-14 00:00")), None);
    }

    #[test]
    fn test_override_removal_restores_original() {
        let shift = week_shift();
        let ov = ScheduleOverride::new(
            shift.id,
            Uuid::new_v4(),
            t("2025-01-08 09:00"),
            t("2025-01-09 17:00"),
        );
        let during = t("2025-01-08 12:00");
        assert_eq!(effective_user_at(&shift, Some(&ov), during), Some(ov.new_user_id));
        assert_eq!(effective_user_at(&shift, None, during), Some(shift.user_id));
    }
}
