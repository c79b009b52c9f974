//! Outbound delivery port.

use async_trait::async_trait;

use crate::domain::errors::CoreResult;
use crate::domain::models::{Incident, NotificationChannel, NotificationMessage, User};

/// One delivery channel (push, chat, ...). The dispatcher fans an envelope
/// out to every notifier whose channel appears in the envelope.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn channel(&self) -> NotificationChannel;

    /// Deliver one envelope to one recipient. Errors are retried by the
    /// dispatcher with backoff.
    async fn deliver(
        &self,
        message: &NotificationMessage,
        incident: &Incident,
        recipient: &User,
    ) -> CoreResult<()>;
}
