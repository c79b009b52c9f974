//! Service model: the routable unit alerts resolve to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-service notification preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPrefs {
    #[serde(default = "default_true")]
    pub push: bool,
    #[serde(default = "default_true")]
    pub chat: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NotificationPrefs {
    fn default() -> Self {
        Self { push: true, chat: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
    pub group_id: Uuid,
    pub name: String,
    pub description: String,
    /// Unique key used by event-API style senders to address this service.
    pub routing_key: String,
    pub escalation_policy_id: Option<Uuid>,
    pub notification_prefs: NotificationPrefs,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Service {
    pub fn new(
        organization_id: Uuid,
        group_id: Uuid,
        name: impl Into<String>,
        routing_key: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            project_id: None,
            group_id,
            name: name.into(),
            description: String::new(),
            routing_key: routing_key.into(),
            escalation_policy_id: None,
            notification_prefs: NotificationPrefs::default(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_escalation_policy(mut self, policy_id: Uuid) -> Self {
        self.escalation_policy_id = Some(policy_id);
        self
    }

    pub fn with_project(mut self, project_id: Uuid) -> Self {
        self.project_id = Some(project_id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_prefs_default_on() {
        let prefs = NotificationPrefs::default();
        assert!(prefs.push);
        assert!(prefs.chat);
    }

    #[test]
    fn test_prefs_deserialize_missing_fields() {
        let prefs: NotificationPrefs = serde_json::from_str("{}").unwrap();
        assert!(prefs.push);
        assert!(prefs.chat);

        let prefs: NotificationPrefs = serde_json::from_str(r#"{"push": false}"#).unwrap();
        assert!(!prefs.push);
        assert!(prefs.chat);
    }
}
