//! Group model: a named collection owning services and schedulers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Organization,
    Public,
}

impl Default for Visibility {
    fn default() -> Self {
        Self::Private
    }
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Organization => "organization",
            Self::Public => "public",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "private" => Some(Self::Private),
            "organization" => Some(Self::Organization),
            "public" => Some(Self::Public),
            _ => None,
        }
    }
}

/// How members of a group are paged when a group is an escalation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationMethod {
    Parallel,
    Sequential,
}

impl Default for EscalationMethod {
    fn default() -> Self {
        Self::Parallel
    }
}

impl EscalationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Sequential => "sequential",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "parallel" => Some(Self::Parallel),
            "sequential" => Some(Self::Sequential),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub visibility: Visibility,
    pub escalation_method: EscalationMethod,
    /// Seconds between member pages when escalating sequentially.
    pub escalation_timeout: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    pub fn new(organization_id: Uuid, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            project_id: None,
            name: name.into(),
            description: String::new(),
            visibility: Visibility::default(),
            escalation_method: EscalationMethod::default(),
            escalation_timeout: 300,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_project(mut self, project_id: Uuid) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_round_trips() {
        for v in [Visibility::Private, Visibility::Organization, Visibility::Public] {
            assert_eq!(Visibility::from_str(v.as_str()), Some(v));
        }
        for m in [EscalationMethod::Parallel, EscalationMethod::Sequential] {
            assert_eq!(EscalationMethod::from_str(m.as_str()), Some(m));
        }
    }

    #[test]
    fn test_group_defaults() {
        let group = Group::new(Uuid::new_v4(), "platform");
        assert_eq!(group.visibility, Visibility::Private);
        assert_eq!(group.escalation_method, EscalationMethod::Parallel);
        assert!(group.is_active);
        assert!(group.project_id.is_none());
    }
}
