//! SQLite-backed durable notification queue.
//!
//! Envelopes are normally inserted by the incident repository inside the
//! incident transaction; this adapter covers the consumer side plus
//! standalone enqueues.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{
    NotificationChannel, NotificationMessage, NotificationPriority, NotificationStatus,
    NotificationType,
};
use crate::domain::ports::NotificationQueue;

use super::{parse_ts, parse_uuid};

#[derive(Clone)]
pub struct SqliteNotificationQueue {
    pool: SqlitePool,
}

impl SqliteNotificationQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: String,
    notification_type: String,
    user_id: String,
    incident_id: String,
    channels: String,
    priority: String,
    status: String,
    retry_count: i64,
    visible_at: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<NotificationRow> for NotificationMessage {
    type Error = CoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let notification_type =
            NotificationType::from_str(&row.notification_type).ok_or_else(|| {
                CoreError::Serialization(format!(
                    "unknown notification_type: {}",
                    row.notification_type
                ))
            })?;
        let priority = NotificationPriority::from_str(&row.priority).ok_or_else(|| {
            CoreError::Serialization(format!("unknown priority: {}", row.priority))
        })?;
        let status = NotificationStatus::from_str(&row.status).ok_or_else(|| {
            CoreError::Serialization(format!("unknown notification status: {}", row.status))
        })?;
        let channels: Vec<NotificationChannel> = serde_json::from_str(&row.channels)?;

        Ok(NotificationMessage {
            id: parse_uuid(&row.id, "id")?,
            notification_type,
            user_id: parse_uuid(&row.user_id, "user_id")?,
            incident_id: parse_uuid(&row.incident_id, "incident_id")?,
            channels,
            priority,
            status,
            retry_count: u32::try_from(row.retry_count).unwrap_or(0),
            visible_at: parse_ts(&row.visible_at, "visible_at")?,
            created_at: parse_ts(&row.created_at, "created_at")?,
            updated_at: parse_ts(&row.updated_at, "updated_at")?,
        })
    }
}

#[async_trait]
impl NotificationQueue for SqliteNotificationQueue {
    async fn enqueue(&self, message: &NotificationMessage) -> CoreResult<()> {
        let channels_json = serde_json::to_string(&message.channels)?;
        sqlx::query(
            r#"INSERT INTO incident_notifications (id, notification_type, user_id, incident_id,
               channels, priority, status, retry_count, visible_at, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(message.notification_type.as_str())
        .bind(message.user_id.to_string())
        .bind(message.incident_id.to_string())
        .bind(&channels_json)
        .bind(message.priority.as_str())
        .bind(message.status.as_str())
        .bind(i64::from(message.retry_count))
        .bind(message.visible_at.to_rfc3339())
        .bind(message.created_at.to_rfc3339())
        .bind(message.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> CoreResult<Vec<NotificationMessage>> {
        // Claim inside one transaction so two workers never pick up the same
        // envelope; at-least-once still holds because a crashed claim is
        // returned by release_stuck.
        let mut tx = self.pool.begin().await?;

        let rows: Vec<NotificationRow> = sqlx::query_as(
            r#"SELECT * FROM incident_notifications
               WHERE status = 'pending' AND visible_at <= ?
               ORDER BY CASE priority
                   WHEN 'high' THEN 1
                   WHEN 'medium' THEN 2
                   WHEN 'low' THEN 3
               END, created_at
               LIMIT ?"#,
        )
        .bind(now.to_rfc3339())
        .bind(i64::from(limit))
        .fetch_all(&mut *tx)
        .await?;

        let mut claimed = Vec::with_capacity(rows.len());
        for row in rows {
            let mut message: NotificationMessage = row.try_into()?;
            sqlx::query(
                "UPDATE incident_notifications SET status = 'delivering', updated_at = ? WHERE id = ?",
            )
            .bind(now.to_rfc3339())
            .bind(message.id.to_string())
            .execute(&mut *tx)
            .await?;
            message.status = NotificationStatus::Delivering;
            claimed.push(message);
        }

        tx.commit().await?;
        Ok(claimed)
    }

    async fn mark_delivered(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE incident_notifications SET status = 'delivered', updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("notification", id));
        }
        Ok(())
    }

    async fn reschedule(
        &self,
        id: Uuid,
        retry_count: u32,
        visible_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        let result = sqlx::query(
            r#"UPDATE incident_notifications
               SET status = 'pending', retry_count = ?, visible_at = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(i64::from(retry_count))
        .bind(visible_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("notification", id));
        }
        Ok(())
    }

    async fn mark_dead(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE incident_notifications SET status = 'dead', updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("notification", id));
        }
        Ok(())
    }

    async fn release_stuck(&self, stuck_after: DateTime<Utc>) -> CoreResult<u64> {
        let result = sqlx::query(
            r#"UPDATE incident_notifications
               SET status = 'pending', updated_at = ?
               WHERE status = 'delivering' AND updated_at < ?"#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(stuck_after.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn pending_count(&self) -> CoreResult<u64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM incident_notifications WHERE status = 'pending'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
