//! Notification queue envelope.
//!
//! The incident store never talks to delivery channels directly: it enqueues
//! envelopes onto the durable `incident_notifications` queue inside its own
//! transaction, and the dispatcher worker fans them out afterwards.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Assigned,
    Acknowledged,
    Escalated,
    Resolved,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Acknowledged => "acknowledged",
            Self::Escalated => "escalated",
            Self::Resolved => "resolved",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "assigned" => Some(Self::Assigned),
            "acknowledged" => Some(Self::Acknowledged),
            "escalated" => Some(Self::Escalated),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }

    /// Assignment and escalation page loudly on every channel; state
    /// confirmations go to chat only.
    pub fn channels(&self) -> Vec<NotificationChannel> {
        match self {
            Self::Assigned | Self::Escalated => {
                vec![NotificationChannel::Push, NotificationChannel::Chat]
            }
            Self::Acknowledged | Self::Resolved => vec![NotificationChannel::Chat],
        }
    }

    pub fn priority(&self) -> NotificationPriority {
        match self {
            Self::Assigned | Self::Escalated => NotificationPriority::High,
            Self::Acknowledged | Self::Resolved => NotificationPriority::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Push,
    Chat,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::Chat => "chat",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "push" => Some(Self::Push),
            "chat" => Some(Self::Chat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Delivery state of a queued envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Delivering,
    Delivered,
    /// Exhausted its retries.
    Dead,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivering => "delivering",
            Self::Delivered => "delivered",
            Self::Dead => "dead",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "delivering" => Some(Self::Delivering),
            "delivered" => Some(Self::Delivered),
            "dead" => Some(Self::Dead),
            _ => None,
        }
    }
}

/// One queued notification envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub id: Uuid,
    pub notification_type: NotificationType,
    pub user_id: Uuid,
    pub incident_id: Uuid,
    pub channels: Vec<NotificationChannel>,
    pub priority: NotificationPriority,
    pub status: NotificationStatus,
    pub retry_count: u32,
    /// Not handed to a worker before this instant; implements retry backoff.
    pub visible_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationMessage {
    pub const MAX_RETRIES: u32 = 5;

    /// Build an envelope with the channel set and priority implied by the
    /// notification type.
    pub fn for_event(notification_type: NotificationType, user_id: Uuid, incident_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            notification_type,
            user_id,
            incident_id,
            channels: notification_type.channels(),
            priority: notification_type.priority(),
            status: NotificationStatus::Pending,
            retry_count: 0,
            visible_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < Self::MAX_RETRIES
    }

    /// Exponential backoff: 30s, 60s, 120s, ... capped at one hour.
    pub fn backoff_delay(retry_count: u32) -> Duration {
        let secs = 30_i64.saturating_mul(1_i64 << retry_count.min(16));
        Duration::seconds(secs.min(3600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_set_by_type() {
        assert_eq!(
            NotificationType::Assigned.channels(),
            vec![NotificationChannel::Push, NotificationChannel::Chat]
        );
        assert_eq!(
            NotificationType::Escalated.channels(),
            vec![NotificationChannel::Push, NotificationChannel::Chat]
        );
        assert_eq!(NotificationType::Acknowledged.channels(), vec![NotificationChannel::Chat]);
        assert_eq!(NotificationType::Resolved.channels(), vec![NotificationChannel::Chat]);
    }

    #[test]
    fn test_priority_by_type() {
        assert_eq!(NotificationType::Assigned.priority(), NotificationPriority::High);
        assert_eq!(NotificationType::Escalated.priority(), NotificationPriority::High);
        assert_eq!(NotificationType::Acknowledged.priority(), NotificationPriority::Medium);
        assert_eq!(NotificationType::Resolved.priority(), NotificationPriority::Medium);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(NotificationMessage::backoff_delay(0), Duration::seconds(30));
        assert_eq!(NotificationMessage::backoff_delay(1), Duration::seconds(60));
        assert_eq!(NotificationMessage::backoff_delay(2), Duration::seconds(120));
        assert_eq!(NotificationMessage::backoff_delay(10), Duration::seconds(3600));
        assert_eq!(NotificationMessage::backoff_delay(40), Duration::seconds(3600));
    }

    #[test]
    fn test_retry_budget() {
        let mut msg = NotificationMessage::for_event(
            NotificationType::Assigned,
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        assert!(msg.can_retry());
        msg.retry_count = NotificationMessage::MAX_RETRIES;
        assert!(!msg.can_retry());
    }
}
