//! Chat delivery via an incoming-webhook endpoint.

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde_json::json;
use std::time::Duration;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{
    Incident, NotificationChannel, NotificationMessage, NotificationType, User,
};
use crate::domain::ports::Notifier;

pub struct ChatNotifier {
    http_client: ReqwestClient,
    webhook_url: String,
}

impl ChatNotifier {
    pub fn new(webhook_url: impl Into<String>) -> CoreResult<Self> {
        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| CoreError::DependencyFailed(e.to_string()))?;

        Ok(Self { http_client, webhook_url: webhook_url.into() })
    }

    fn render(message: &NotificationMessage, incident: &Incident, recipient: &User) -> String {
        let verb = match message.notification_type {
            NotificationType::Assigned => "assigned to",
            NotificationType::Acknowledged => "acknowledged by",
            NotificationType::Escalated => "escalated to",
            NotificationType::Resolved => "resolved for",
        };
        format!(
            "[{}/{}] {} — {} {}",
            incident.severity.as_str(),
            incident.urgency.as_str(),
            incident.title,
            verb,
            recipient.name,
        )
    }
}

#[async_trait]
impl Notifier for ChatNotifier {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Chat
    }

    async fn deliver(
        &self,
        message: &NotificationMessage,
        incident: &Incident,
        recipient: &User,
    ) -> CoreResult<()> {
        let body = json!({ "text": Self::render(message, incident, recipient) });

        let response = self
            .http_client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::DependencyFailed(format!("chat webhook: {e}")))?;

        if !response.status().is_success() {
            return Err(CoreError::DependencyFailed(format!(
                "chat webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
