//! Push delivery via an HTTP push gateway.

use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::{Incident, NotificationChannel, NotificationMessage, User};
use crate::domain::ports::{Notifier, UserRepository};

pub struct PushNotifier {
    http_client: ReqwestClient,
    gateway_url: String,
    api_key: Option<String>,
    users: Arc<dyn UserRepository>,
}

impl PushNotifier {
    pub fn new(
        gateway_url: impl Into<String>,
        api_key: Option<String>,
        users: Arc<dyn UserRepository>,
    ) -> CoreResult<Self> {
        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| CoreError::DependencyFailed(e.to_string()))?;

        Ok(Self {
            http_client,
            gateway_url: gateway_url.into().trim_end_matches('/').to_string(),
            api_key,
            users,
        })
    }
}

#[async_trait]
impl Notifier for PushNotifier {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::Push
    }

    async fn deliver(
        &self,
        message: &NotificationMessage,
        incident: &Incident,
        recipient: &User,
    ) -> CoreResult<()> {
        let tokens = self.users.list_device_tokens(recipient.id).await?;
        if tokens.is_empty() {
            tracing::debug!(
                user_id = %recipient.id,
                incident_id = %incident.id,
                "recipient has no push devices registered"
            );
            return Ok(());
        }

        let body = json!({
            "tokens": tokens.iter().map(|t| t.token.clone()).collect::<Vec<_>>(),
            "title": format!("[{}] {}", incident.severity.as_str(), incident.title),
            "body": incident.description,
            "priority": message.priority.as_str(),
            "data": {
                "incident_id": incident.id,
                "notification_type": message.notification_type.as_str(),
                "urgency": incident.urgency.as_str(),
            }
        });

        let mut request = self
            .http_client
            .post(format!("{}/send", self.gateway_url))
            .json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| CoreError::DependencyFailed(format!("push gateway: {e}")))?;

        if !response.status().is_success() {
            return Err(CoreError::DependencyFailed(format!(
                "push gateway returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}
