//! User model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A person (or synthetic principal) who can own, acknowledge, or resolve
/// incidents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Identity-provider-issued ID, or `system:{source}` for synthetic users.
    pub provider_id: String,
    pub email: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(provider_id: impl Into<String>, email: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            provider_id: provider_id.into(),
            email: email.into(),
            name: name.into(),
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Synthetic principal recorded as `created_by`/`resolved_by` for
    /// automated state changes (e.g. a vendor resolve payload).
    pub fn system(source: &str) -> Self {
        let mut user = Self::new(
            format!("system:{source}"),
            format!("{source}@system.invalid"),
            format!("{source} (automation)"),
        );
        user.is_active = false;
        user
    }

    pub fn is_system(&self) -> bool {
        self.provider_id.starts_with("system:")
    }
}

/// A registered push-notification device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub platform: String,
    pub created_at: DateTime<Utc>,
}

impl DeviceToken {
    pub fn new(user_id: Uuid, token: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            token: token.into(),
            platform: platform.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_user_shape() {
        let user = User::system("prometheus");
        assert_eq!(user.provider_id, "system:prometheus");
        assert!(user.is_system());
        assert!(!user.is_active);
    }

    #[test]
    fn test_regular_user_is_not_system() {
        let user = User::new("auth0|123", "a@example.com", "Alex");
        assert!(!user.is_system());
        assert!(user.is_active);
    }
}
