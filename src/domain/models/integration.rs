//! Integration model: external monitoring sources and their routing into
//! services.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use super::alert::ProcessedAlert;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationType {
    Prometheus,
    Datadog,
    Grafana,
    Aws,
    Webhook,
    Custom,
}

impl IntegrationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prometheus => "prometheus",
            Self::Datadog => "datadog",
            Self::Grafana => "grafana",
            Self::Aws => "aws",
            Self::Webhook => "webhook",
            Self::Custom => "custom",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "prometheus" => Some(Self::Prometheus),
            "datadog" => Some(Self::Datadog),
            "grafana" => Some(Self::Grafana),
            "aws" => Some(Self::Aws),
            "webhook" => Some(Self::Webhook),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }
}

/// Heartbeat-derived health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Unknown,
    Healthy,
    Warning,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Healthy => "healthy",
            Self::Warning => "warning",
            Self::Unhealthy => "unhealthy",
        }
    }
}

/// An external monitoring source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
    pub name: String,
    pub integration_type: IntegrationType,
    pub config: Value,
    pub webhook_secret: Option<String>,
    pub is_active: bool,
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Expected heartbeat cadence in seconds.
    pub heartbeat_interval: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Integration {
    pub fn new(
        organization_id: Uuid,
        name: impl Into<String>,
        integration_type: IntegrationType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            organization_id,
            project_id: None,
            name: name.into(),
            integration_type,
            config: Value::Object(serde_json::Map::new()),
            webhook_secret: None,
            is_active: true,
            last_heartbeat: None,
            heartbeat_interval: 300,
            created_at: now,
            updated_at: now,
        }
    }

    /// The ingestion path is derived, never stored.
    pub fn webhook_path(&self) -> String {
        format!("/webhook/{}/{}", self.integration_type.as_str(), self.id)
    }

    pub fn webhook_url(&self, public_base: &str) -> String {
        format!("{}{}", public_base.trim_end_matches('/'), self.webhook_path())
    }

    /// Health relative to `now`: unknown without a heartbeat, unhealthy past
    /// twice the interval, warning past one interval.
    pub fn health(&self, now: DateTime<Utc>) -> HealthStatus {
        let Some(last) = self.last_heartbeat else {
            return HealthStatus::Unknown;
        };
        let interval = Duration::seconds(i64::from(self.heartbeat_interval));
        let age = now - last;
        if age > interval * 2 {
            HealthStatus::Unhealthy
        } else if age > interval {
            HealthStatus::Warning
        } else {
            HealthStatus::Healthy
        }
    }
}

/// Predicates deciding whether an integration's alert belongs to a service.
/// Omitted keys match trivially.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingConditions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alertname: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

impl RoutingConditions {
    /// All present predicates must hold.
    pub fn matches(&self, alert: &ProcessedAlert) -> bool {
        if let Some(severities) = &self.severity {
            if !severities.iter().any(|s| s == alert.severity.as_str()) {
                return false;
            }
        }
        if let Some(names) = &self.alertname {
            let wildcard = names.iter().any(|n| n == "*");
            if !wildcard && !names.iter().any(|n| n == &alert.alert_name) {
                return false;
            }
        }
        if let Some(labels) = &self.labels {
            for (key, expected) in labels {
                if alert.label(key) != Some(expected.as_str()) {
                    return false;
                }
            }
        }
        true
    }
}

/// Join row between a service and an integration. Lower priority wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceIntegration {
    pub id: Uuid,
    pub service_id: Uuid,
    pub integration_id: Uuid,
    pub routing_conditions: RoutingConditions,
    pub priority: u32,
    pub created_at: DateTime<Utc>,
}

impl ServiceIntegration {
    pub fn new(service_id: Uuid, integration_id: Uuid, priority: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            service_id,
            integration_id,
            routing_conditions: RoutingConditions::default(),
            priority,
            created_at: Utc::now(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(1..=1000).contains(&self.priority) {
            return Err(format!("priority {} outside 1..=1000", self.priority));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::incident::Severity;

    fn alert() -> ProcessedAlert {
        let mut a = ProcessedAlert::new("HighCPU");
        a.severity = Severity::Critical;
        a.labels.insert("env".into(), "prod".into());
        a.labels.insert("instance".into(), "web-1".into());
        a
    }

    #[test]
    fn test_empty_conditions_match_everything() {
        assert!(RoutingConditions::default().matches(&alert()));
    }

    #[test]
    fn test_severity_allowlist() {
        let mut c = RoutingConditions::default();
        c.severity = Some(vec!["critical".into(), "high".into()]);
        assert!(c.matches(&alert()));

        c.severity = Some(vec!["info".into()]);
        assert!(!c.matches(&alert()));
    }

    #[test]
    fn test_alertname_matcher_and_wildcard() {
        let mut c = RoutingConditions::default();
        c.alertname = Some(vec!["HighCPU".into()]);
        assert!(c.matches(&alert()));

        c.alertname = Some(vec!["DiskFull".into()]);
        assert!(!c.matches(&alert()));

        c.alertname = Some(vec!["DiskFull".into(), "*".into()]);
        assert!(c.matches(&alert()));
    }

    #[test]
    fn test_label_equality() {
        let mut c = RoutingConditions::default();
        let mut labels = HashMap::new();
        labels.insert("env".to_string(), "prod".to_string());
        c.labels = Some(labels.clone());
        assert!(c.matches(&alert()));

        labels.insert("env".to_string(), "staging".to_string());
        c.labels = Some(labels.clone());
        assert!(!c.matches(&alert()));

        labels.insert("env".to_string(), "prod".to_string());
        labels.insert("region".to_string(), "eu".to_string());
        c.labels = Some(labels);
        assert!(!c.matches(&alert()), "missing label must not match");
    }

    #[test]
    fn test_health_thresholds() {
        let now = Utc::now();
        let mut integration =
            Integration::new(Uuid::new_v4(), "prom", IntegrationType::Prometheus);
        integration.heartbeat_interval = 60;

        assert_eq!(integration.health(now), HealthStatus::Unknown);

        integration.last_heartbeat = Some(now - Duration::seconds(30));
        assert_eq!(integration.health(now), HealthStatus::Healthy);

        integration.last_heartbeat = Some(now - Duration::seconds(90));
        assert_eq!(integration.health(now), HealthStatus::Warning);

        integration.last_heartbeat = Some(now - Duration::seconds(121));
        assert_eq!(integration.health(now), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_webhook_url_derivation() {
        let integration = Integration::new(Uuid::new_v4(), "prom", IntegrationType::Prometheus);
        let url = integration.webhook_url("https://vigil.example.com/");
        assert_eq!(
            url,
            format!("https://vigil.example.com/webhook/prometheus/{}", integration.id)
        );
    }

    #[test]
    fn test_priority_validation() {
        let mut si = ServiceIntegration::new(Uuid::new_v4(), Uuid::new_v4(), 1);
        assert!(si.validate().is_ok());
        si.priority = 0;
        assert!(si.validate().is_err());
        si.priority = 1001;
        assert!(si.validate().is_err());
    }
}
