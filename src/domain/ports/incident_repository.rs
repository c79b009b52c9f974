//! Incident repository port.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::errors::CoreResult;
use crate::domain::models::{
    Incident, IncidentEvent, IncidentStatus, NotificationMessage, ScopeFilter, Severity, Urgency,
};

/// Assignee filter: any, explicitly unassigned, or a specific user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssigneeFilter {
    #[default]
    Any,
    Unassigned,
    User(Uuid),
}

impl AssigneeFilter {
    /// Parse the query form: `"unassigned"` or a user UUID.
    pub fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("unassigned") {
            return Some(Self::Unassigned);
        }
        Uuid::parse_str(s).ok().map(Self::User)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    Last24Hours,
    Last7Days,
    Last30Days,
    Last90Days,
    #[default]
    All,
}

impl TimeRange {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Last24Hours => "last_24_hours",
            Self::Last7Days => "last_7_days",
            Self::Last30Days => "last_30_days",
            Self::Last90Days => "last_90_days",
            Self::All => "all",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "last_24_hours" => Some(Self::Last24Hours),
            "last_7_days" => Some(Self::Last7Days),
            "last_30_days" => Some(Self::Last30Days),
            "last_90_days" => Some(Self::Last90Days),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    /// Lower bound on `created_at`, when the range is bounded.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Last24Hours => Some(now - Duration::hours(24)),
            Self::Last7Days => Some(now - Duration::days(7)),
            Self::Last30Days => Some(now - Duration::days(30)),
            Self::Last90Days => Some(now - Duration::days(90)),
            Self::All => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    CreatedDesc,
    CreatedAsc,
    UpdatedDesc,
}

impl SortOrder {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "created_desc" | "newest" => Some(Self::CreatedDesc),
            "created_asc" | "oldest" => Some(Self::CreatedAsc),
            "updated_desc" => Some(Self::UpdatedDesc),
            _ => None,
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Self::CreatedDesc => "created_at DESC",
            Self::CreatedAsc => "created_at ASC",
            Self::UpdatedDesc => "updated_at DESC",
        }
    }
}

/// Filter criteria for incident listing.
#[derive(Debug, Clone, Default)]
pub struct IncidentFilter {
    /// Substring match over title and description.
    pub search: Option<String>,
    pub status: Option<IncidentStatus>,
    pub urgency: Option<Urgency>,
    pub severity: Option<Severity>,
    pub assigned_to: AssigneeFilter,
    pub service_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub time_range: TimeRange,
    pub sort: SortOrder,
    pub page: u32,
    pub limit: u32,
}

impl IncidentFilter {
    pub const MAX_LIMIT: u32 = 100;

    /// Effective page size, clamped to the cap.
    pub fn effective_limit(&self) -> u32 {
        match self.limit {
            0 => 50,
            n => n.min(Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> u32 {
        self.page.saturating_sub(1) * self.effective_limit()
    }
}

/// 30-day rollup used by the stats endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncidentStats {
    pub total: u64,
    pub triggered: u64,
    pub acknowledged: u64,
    pub resolved: u64,
    pub by_severity: HashMap<String, u64>,
    pub mean_seconds_to_acknowledge: Option<f64>,
    pub mean_seconds_to_resolve: Option<f64>,
}

#[async_trait]
pub trait IncidentRepository: Send + Sync {
    /// Insert the incident, its initial events, and any queued notifications
    /// in one transaction.
    async fn create_atomic(
        &self,
        incident: &Incident,
        events: &[IncidentEvent],
        notifications: &[NotificationMessage],
    ) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Incident>>;

    /// Persist a state change together with its audit events and queued
    /// notifications, atomically.
    async fn update_with_events(
        &self,
        incident: &Incident,
        events: &[IncidentEvent],
        notifications: &[NotificationMessage],
    ) -> CoreResult<()>;

    /// Correlated refire bookkeeping: `alert_count + 1`, refreshed
    /// `updated_at`.
    async fn record_refire(&self, id: Uuid, at: DateTime<Utc>) -> CoreResult<()>;

    async fn list(
        &self,
        filter: &IncidentFilter,
        scope: &ScopeFilter,
    ) -> CoreResult<Vec<Incident>>;

    /// Most recent open incident carrying this fingerprint label.
    async fn find_open_by_fingerprint(
        &self,
        organization_id: Uuid,
        fingerprint: &str,
    ) -> CoreResult<Option<Incident>>;

    /// Most recent open incident matching alertname + instance labels
    /// (+ job, when supplied).
    async fn find_open_by_labels(
        &self,
        organization_id: Uuid,
        alertname: &str,
        instance: &str,
        job: Option<&str>,
    ) -> CoreResult<Option<Incident>>;

    /// Most recent open incident with this exact title.
    async fn find_open_by_title(
        &self,
        organization_id: Uuid,
        title: &str,
    ) -> CoreResult<Option<Incident>>;

    /// Most recent open incident carrying this external dedup key.
    async fn find_open_by_incident_key(
        &self,
        organization_id: Uuid,
        incident_key: &str,
    ) -> CoreResult<Option<Incident>>;

    async fn append_event(&self, event: &IncidentEvent) -> CoreResult<()>;

    /// Audit stream, oldest first.
    async fn list_events(&self, incident_id: Uuid, limit: u32)
        -> CoreResult<Vec<IncidentEvent>>;

    /// Open incidents with a policy whose escalation is not yet completed.
    async fn list_escalation_candidates(&self, limit: u32) -> CoreResult<Vec<Incident>>;

    async fn stats(&self, scope: &ScopeFilter, since: DateTime<Utc>)
        -> CoreResult<IncidentStats>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignee_filter_parse() {
        assert_eq!(AssigneeFilter::parse("unassigned"), Some(AssigneeFilter::Unassigned));
        let id = Uuid::new_v4();
        assert_eq!(AssigneeFilter::parse(&id.to_string()), Some(AssigneeFilter::User(id)));
        assert_eq!(AssigneeFilter::parse("nobody"), None);
    }

    #[test]
    fn test_time_range_cutoffs() {
        let now = Utc::now();
        assert_eq!(TimeRange::All.cutoff(now), None);
        assert_eq!(TimeRange::Last24Hours.cutoff(now), Some(now - Duration::hours(24)));
        assert_eq!(TimeRange::Last90Days.cutoff(now), Some(now - Duration::days(90)));
    }

    #[test]
    fn test_limit_clamped() {
        let mut filter = IncidentFilter::default();
        assert_eq!(filter.effective_limit(), 50);
        filter.limit = 500;
        assert_eq!(filter.effective_limit(), 100);
        filter.limit = 10;
        filter.page = 3;
        assert_eq!(filter.offset(), 20);
    }
}
