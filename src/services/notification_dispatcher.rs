//! Notification dispatcher worker.
//!
//! Consumes the durable `incident_notifications` queue with at-least-once
//! semantics and fans each envelope out to its channels. Failed deliveries
//! are re-enqueued with exponential backoff; exhausted envelopes are parked
//! as dead.

use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::domain::errors::CoreResult;
use crate::domain::models::{NotificationChannel, NotificationMessage};
use crate::domain::ports::{IncidentRepository, NotificationQueue, Notifier, UserRepository};

/// Claims older than this are assumed to belong to a crashed worker.
const STUCK_CLAIM_AGE_MINUTES: i64 = 10;

pub struct NotificationDispatcher {
    queue: Arc<dyn NotificationQueue>,
    incidents: Arc<dyn IncidentRepository>,
    users: Arc<dyn UserRepository>,
    notifiers: HashMap<NotificationChannel, Arc<dyn Notifier>>,
    batch_size: u32,
}

impl NotificationDispatcher {
    pub fn new(
        queue: Arc<dyn NotificationQueue>,
        incidents: Arc<dyn IncidentRepository>,
        users: Arc<dyn UserRepository>,
        notifiers: Vec<Arc<dyn Notifier>>,
    ) -> Self {
        let notifiers = notifiers.into_iter().map(|n| (n.channel(), n)).collect();
        Self { queue, incidents, users, notifiers, batch_size: 50 }
    }

    /// Worker loop. Exits when the shutdown channel flips to true; the
    /// in-flight batch finishes first.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>, poll_interval: Duration) {
        let mut ticker = tokio::time::interval(poll_interval);
        tracing::info!("notification dispatcher started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.process_batch().await {
                        Ok(0) => {}
                        Ok(n) => tracing::debug!(count = n, "dispatched notifications"),
                        Err(e) => tracing::warn!(error = %e, "notification batch failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("notification dispatcher stopping");
                        break;
                    }
                }
            }
        }
    }

    /// One polling round: recover stuck claims, then deliver due envelopes.
    pub async fn process_batch(&self) -> CoreResult<usize> {
        let now = Utc::now();

        let released = self
            .queue
            .release_stuck(now - ChronoDuration::minutes(STUCK_CLAIM_AGE_MINUTES))
            .await?;
        if released > 0 {
            tracing::warn!(count = released, "released stuck notification claims");
        }

        let batch = self.queue.fetch_due(now, self.batch_size).await?;
        let mut delivered = 0;

        for message in batch {
            match self.deliver(&message).await {
                Ok(()) => {
                    self.queue.mark_delivered(message.id).await?;
                    delivered += 1;
                }
                Err(e) => {
                    if message.can_retry() {
                        let retry_count = message.retry_count + 1;
                        let visible_at =
                            Utc::now() + NotificationMessage::backoff_delay(message.retry_count);
                        tracing::warn!(
                            notification_id = %message.id,
                            retry_count,
                            error = %e,
                            "delivery failed; re-enqueued with backoff"
                        );
                        self.queue.reschedule(message.id, retry_count, visible_at).await?;
                    } else {
                        tracing::error!(
                            notification_id = %message.id,
                            error = %e,
                            "delivery failed permanently; parking envelope"
                        );
                        self.queue.mark_dead(message.id).await?;
                    }
                }
            }
        }

        Ok(delivered)
    }

    async fn deliver(&self, message: &NotificationMessage) -> CoreResult<()> {
        let incident = self
            .incidents
            .get(message.incident_id)
            .await?
            .ok_or_else(|| crate::domain::errors::CoreError::not_found(
                "incident",
                message.incident_id,
            ))?;
        let recipient = self
            .users
            .get(message.user_id)
            .await?
            .ok_or_else(|| crate::domain::errors::CoreError::not_found(
                "user",
                message.user_id,
            ))?;

        for channel in &message.channels {
            let Some(notifier) = self.notifiers.get(channel) else {
                tracing::debug!(
                    channel = channel.as_str(),
                    notification_id = %message.id,
                    "no notifier configured for channel; skipping"
                );
                continue;
            };
            notifier.deliver(message, &incident, &recipient).await?;
        }

        Ok(())
    }
}
