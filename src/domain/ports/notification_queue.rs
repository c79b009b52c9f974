//! Notification queue port (consumer side).
//!
//! Producers enqueue through the incident repository so envelopes commit
//! with the incident transaction; this port is what the dispatcher worker
//! and manual re-send paths use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::CoreResult;
use crate::domain::models::NotificationMessage;

#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Standalone enqueue, outside any incident transaction.
    async fn enqueue(&self, message: &NotificationMessage) -> CoreResult<()>;

    /// Claim up to `limit` pending envelopes whose `visible_at` has passed,
    /// marking them as delivering. At-least-once: a crashed worker's claims
    /// become visible again via `release_stuck`.
    async fn fetch_due(
        &self,
        now: DateTime<Utc>,
        limit: u32,
    ) -> CoreResult<Vec<NotificationMessage>>;

    async fn mark_delivered(&self, id: Uuid) -> CoreResult<()>;

    /// Put a failed envelope back with an incremented retry count, hidden
    /// until `visible_at`.
    async fn reschedule(
        &self,
        id: Uuid,
        retry_count: u32,
        visible_at: DateTime<Utc>,
    ) -> CoreResult<()>;

    /// Exhausted envelopes are parked, not deleted.
    async fn mark_dead(&self, id: Uuid) -> CoreResult<()>;

    /// Return stale `delivering` claims (older than `stuck_after`) to
    /// pending.
    async fn release_stuck(&self, stuck_after: DateTime<Utc>) -> CoreResult<u64>;

    async fn pending_count(&self) -> CoreResult<u64>;
}
