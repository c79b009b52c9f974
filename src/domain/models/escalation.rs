//! Escalation policy model: ordered levels with heterogeneous targets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who (or what) a level pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum EscalationTarget {
    /// A specific user, returned directly.
    User(Uuid),
    /// Whoever is effectively on call for this scheduler.
    Scheduler(Uuid),
    /// Whoever is effectively on call for this group.
    Group(Uuid),
    /// Whoever is effectively on call for the incident's own group.
    CurrentSchedule,
    /// An external hook; no user assignment results.
    External(Option<Uuid>),
}

impl EscalationTarget {
    pub fn target_type(&self) -> &'static str {
        match self {
            Self::User(_) => "user",
            Self::Scheduler(_) => "scheduler",
            Self::Group(_) => "group",
            Self::CurrentSchedule => "current_schedule",
            Self::External(_) => "external",
        }
    }

    pub fn target_id(&self) -> Option<Uuid> {
        match self {
            Self::User(id) | Self::Scheduler(id) | Self::Group(id) => Some(*id),
            Self::External(id) => *id,
            Self::CurrentSchedule => None,
        }
    }

    /// Rebuild from the stored `(target_type, target_id)` pair.
    pub fn from_parts(target_type: &str, target_id: Option<Uuid>) -> Option<Self> {
        match target_type {
            "user" => target_id.map(Self::User),
            "scheduler" => target_id.map(Self::Scheduler),
            "group" => target_id.map(Self::Group),
            "current_schedule" => Some(Self::CurrentSchedule),
            "external" => Some(Self::External(target_id)),
            _ => None,
        }
    }
}

/// One step in a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationLevel {
    pub id: Uuid,
    pub policy_id: Uuid,
    /// Contiguous, starting at 1.
    pub level_number: u32,
    pub target: EscalationTarget,
    pub timeout_minutes: u32,
}

impl EscalationLevel {
    pub fn new(policy_id: Uuid, level_number: u32, target: EscalationTarget) -> Self {
        Self {
            id: Uuid::new_v4(),
            policy_id,
            level_number,
            target,
            timeout_minutes: 30,
        }
    }

    pub fn with_timeout(mut self, minutes: u32) -> Self {
        self.timeout_minutes = minutes;
        self
    }
}

/// A named, ordered list of levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
    pub group_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EscalationPolicy {
    pub fn new(organization_id: Uuid, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            project_id: None,
            group_id: None,
            name: name.into(),
            description: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Level numbers must form 1..=N with no gaps or duplicates. Levels are
/// expected sorted by `level_number`.
pub fn validate_levels(levels: &[EscalationLevel]) -> Result<(), String> {
    if levels.is_empty() {
        return Err("a policy requires at least one level".to_string());
    }
    for (idx, level) in levels.iter().enumerate() {
        let expected = u32::try_from(idx + 1).expect("level count fits u32");
        if level.level_number != expected {
            return Err(format!(
                "level numbers must be contiguous from 1; found {} at position {}",
                level.level_number,
                idx + 1
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_parts_round_trip() {
        let id = Uuid::new_v4();
        for target in [
            EscalationTarget::User(id),
            EscalationTarget::Scheduler(id),
            EscalationTarget::Group(id),
            EscalationTarget::CurrentSchedule,
            EscalationTarget::External(Some(id)),
            EscalationTarget::External(None),
        ] {
            let rebuilt =
                EscalationTarget::from_parts(target.target_type(), target.target_id());
            assert_eq!(rebuilt, Some(target));
        }
        assert_eq!(EscalationTarget::from_parts("pager", None), None);
        assert_eq!(EscalationTarget::from_parts("user", None), None);
    }

    #[test]
    fn test_contiguous_levels() {
        let policy = Uuid::new_v4();
        let levels = vec![
            EscalationLevel::new(policy, 1, EscalationTarget::CurrentSchedule),
            EscalationLevel::new(policy, 2, EscalationTarget::User(Uuid::new_v4())),
            EscalationLevel::new(policy, 3, EscalationTarget::External(None)),
        ];
        assert!(validate_levels(&levels).is_ok());
    }

    #[test]
    fn test_gapped_levels_rejected() {
        let policy = Uuid::new_v4();
        let levels = vec![
            EscalationLevel::new(policy, 1, EscalationTarget::CurrentSchedule),
            EscalationLevel::new(policy, 3, EscalationTarget::User(Uuid::new_v4())),
        ];
        assert!(validate_levels(&levels).is_err());
        assert!(validate_levels(&[]).is_err());
    }

    #[test]
    fn test_levels_must_start_at_one() {
        let policy = Uuid::new_v4();
        let levels = vec![EscalationLevel::new(policy, 2, EscalationTarget::CurrentSchedule)];
        assert!(validate_levels(&levels).is_err());
    }
}
