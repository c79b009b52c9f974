//! ReBAC membership model.
//!
//! A membership is a relation tuple `(user, resource_type, resource, role)`.
//! It is the single source of truth for access; there are no per-resource
//! member tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};

/// Kind of resource a membership can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Org,
    Project,
    Group,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Org => "org",
            Self::Project => "project",
            Self::Group => "group",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "org" | "organization" => Some(Self::Org),
            "project" => Some(Self::Project),
            "group" => Some(Self::Group),
            _ => None,
        }
    }
}

/// One access-relationship tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(
        user_id: Uuid,
        resource_type: ResourceType,
        resource_id: Uuid,
        role: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            resource_type,
            resource_id,
            role: role.into(),
            created_at: Utc::now(),
        }
    }
}

/// Tenant + visibility scope for list queries.
///
/// Carries the mandatory organization filter, the calling user (for the
/// membership sub-select), and the optional strict project filter. Every
/// list query over a scoped table must run its WHERE clause through
/// [`push_sql`](Self::push_sql).
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub project_id: Option<Uuid>,
}

impl ScopeFilter {
    /// Build a scope; a missing organization is a caller error.
    pub fn new(
        organization_id: Option<Uuid>,
        user_id: Uuid,
        project_id: Option<Uuid>,
    ) -> CoreResult<Self> {
        let organization_id = organization_id.ok_or(CoreError::MissingOrgContext)?;
        Ok(Self { organization_id, user_id, project_id })
    }

    /// Append the scope clauses to a query under construction.
    ///
    /// With a project: strict equality (access to the project itself is
    /// checked at the routing layer, not re-checked here). Without one:
    /// org-level rows plus rows in projects the user is a member of.
    pub fn push_sql(&self, query: &mut String, bindings: &mut Vec<String>) {
        query.push_str(" AND organization_id = ?");
        bindings.push(self.organization_id.to_string());

        match self.project_id {
            Some(project_id) => {
                query.push_str(" AND project_id = ?");
                bindings.push(project_id.to_string());
            }
            None => {
                query.push_str(
                    " AND (project_id IS NULL OR project_id IN \
                     (SELECT resource_id FROM memberships \
                      WHERE user_id = ? AND resource_type = 'project'))",
                );
                bindings.push(self.user_id.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_round_trip() {
        for rt in [ResourceType::Org, ResourceType::Project, ResourceType::Group] {
            assert_eq!(ResourceType::from_str(rt.as_str()), Some(rt));
        }
        assert_eq!(ResourceType::from_str("team"), None);
    }

    #[test]
    fn test_scope_requires_org() {
        let err = ScopeFilter::new(None, Uuid::new_v4(), None).unwrap_err();
        assert!(matches!(err, CoreError::MissingOrgContext));
    }

    #[test]
    fn test_scope_sql_without_project() {
        let scope = ScopeFilter::new(Some(Uuid::new_v4()), Uuid::new_v4(), None).unwrap();
        let mut query = String::from("SELECT * FROM incidents WHERE 1=1");
        let mut bindings = Vec::new();
        scope.push_sql(&mut query, &mut bindings);

        assert!(query.contains("organization_id = ?"));
        assert!(query.contains("project_id IS NULL OR project_id IN"));
        assert!(query.contains("resource_type = 'project'"));
        assert_eq!(bindings.len(), 2);
    }

    #[test]
    fn test_scope_sql_with_project_is_strict() {
        let project = Uuid::new_v4();
        let scope =
            ScopeFilter::new(Some(Uuid::new_v4()), Uuid::new_v4(), Some(project)).unwrap();
        let mut query = String::from("SELECT * FROM services WHERE 1=1");
        let mut bindings = Vec::new();
        scope.push_sql(&mut query, &mut bindings);

        assert!(query.contains("project_id = ?"));
        assert!(!query.contains("memberships"));
        assert_eq!(bindings[1], project.to_string());
    }
}
