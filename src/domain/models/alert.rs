//! Normalized alert model.
//!
//! Every vendor payload is reduced to a `ProcessedAlert` before routing.
//! The vendor severity/status mapping tables live here as the single source
//! of truth; the per-vendor normalizers only reshape payload fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::incident::Severity;

/// Normalized alert state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Firing,
    Resolved,
    /// Anything the vendor mapping could not classify; treated as firing.
    Unknown,
}

impl Default for AlertStatus {
    fn default() -> Self {
        Self::Firing
    }
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Firing => "firing",
            Self::Resolved => "resolved",
            Self::Unknown => "unknown",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "firing" => Some(Self::Firing),
            "resolved" => Some(Self::Resolved),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Unknown statuses take the firing path.
    pub fn is_firing(&self) -> bool {
        !matches!(self, Self::Resolved)
    }
}

/// A vendor alert after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedAlert {
    pub alert_name: String,
    pub severity: Severity,
    pub status: AlertStatus,
    pub summary: String,
    pub description: String,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    /// Vendor-provided correlation key, when one exists.
    pub fingerprint: Option<String>,
}

impl ProcessedAlert {
    pub fn new(alert_name: impl Into<String>) -> Self {
        Self {
            alert_name: alert_name.into(),
            severity: Severity::default(),
            status: AlertStatus::default(),
            summary: String::new(),
            description: String::new(),
            labels: HashMap::new(),
            annotations: HashMap::new(),
            starts_at: Utc::now(),
            ends_at: None,
            fingerprint: None,
        }
    }

    /// The vendor fingerprint, or a deterministic derivation from
    /// `alertname`, `instance`, and `job`. Empty components are permitted so
    /// the string stays stable across refires.
    pub fn fingerprint(&self) -> String {
        if let Some(fp) = &self.fingerprint {
            if !fp.is_empty() {
                return fp.clone();
            }
        }
        let instance = self.labels.get("instance").map(String::as_str).unwrap_or("");
        let job = self.labels.get("job").map(String::as_str).unwrap_or("");
        format!("{}-{}-{}", self.alert_name, instance, job)
    }

    /// Incident title: summary when present, alert name otherwise.
    pub fn title(&self) -> &str {
        if self.summary.is_empty() { &self.alert_name } else { &self.summary }
    }

    /// Incident description fallback chain.
    pub fn incident_description(&self) -> &str {
        if self.description.is_empty() { &self.alert_name } else { &self.description }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Datadog `alert_priority` → severity.
pub fn datadog_severity(priority: &str) -> Severity {
    match priority {
        "P1" | "critical" => Severity::Critical,
        "P2" | "high" => Severity::High,
        "P3" | "normal" => Severity::Warning,
        "P4" | "low" => Severity::Info,
        _ => Severity::Warning,
    }
}

/// Datadog `transition` → status.
pub fn datadog_status(transition: &str) -> AlertStatus {
    match transition.to_lowercase().as_str() {
        "triggered" | "alerting" => AlertStatus::Firing,
        "recovered" | "ok" => AlertStatus::Resolved,
        _ => AlertStatus::Firing,
    }
}

/// Grafana `state` → severity.
pub fn grafana_severity(state: &str) -> Severity {
    match state.to_lowercase().as_str() {
        "alerting" => Severity::Critical,
        "pending" => Severity::Warning,
        "ok" => Severity::Info,
        _ => Severity::Warning,
    }
}

/// Grafana `state` → status.
pub fn grafana_status(state: &str) -> AlertStatus {
    match state.to_lowercase().as_str() {
        "alerting" | "pending" => AlertStatus::Firing,
        "ok" => AlertStatus::Resolved,
        _ => AlertStatus::Firing,
    }
}

/// CloudWatch `NewStateValue` → severity.
pub fn aws_severity(state: &str) -> Severity {
    match state {
        "ALARM" => Severity::Critical,
        "INSUFFICIENT_DATA" => Severity::Warning,
        "OK" => Severity::Info,
        _ => Severity::Warning,
    }
}

/// CloudWatch `NewStateValue` → status.
pub fn aws_status(state: &str) -> AlertStatus {
    match state {
        "ALARM" => AlertStatus::Firing,
        "OK" => AlertStatus::Resolved,
        _ => AlertStatus::Firing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_prefers_vendor_value() {
        let mut alert = ProcessedAlert::new("HighCPU");
        alert.fingerprint = Some("abc".into());
        assert_eq!(alert.fingerprint(), "abc");
    }

    #[test]
    fn test_fingerprint_derivation() {
        let mut alert = ProcessedAlert::new("DiskFull");
        alert.labels.insert("instance".into(), "db-2".into());
        alert.labels.insert("job".into(), "node".into());
        assert_eq!(alert.fingerprint(), "DiskFull-db-2-node");
    }

    #[test]
    fn test_fingerprint_derivation_with_missing_labels() {
        let alert = ProcessedAlert::new("DiskFull");
        assert_eq!(alert.fingerprint(), "DiskFull--");

        // Stable across refires of the same shape.
        let again = ProcessedAlert::new("DiskFull");
        assert_eq!(alert.fingerprint(), again.fingerprint());
    }

    #[test]
    fn test_empty_vendor_fingerprint_falls_back_to_derivation() {
        let mut alert = ProcessedAlert::new("X");
        alert.fingerprint = Some(String::new());
        assert_eq!(alert.fingerprint(), "X--");
    }

    #[test]
    fn test_title_and_description_fallbacks() {
        let mut alert = ProcessedAlert::new("HighCPU");
        assert_eq!(alert.title(), "HighCPU");
        assert_eq!(alert.incident_description(), "HighCPU");

        alert.summary = "CPU>90%".into();
        alert.description = "CPU has been above 90% for 5m".into();
        assert_eq!(alert.title(), "CPU>90%");
        assert_eq!(alert.incident_description(), "CPU has been above 90% for 5m");
    }

    #[test]
    fn test_unknown_status_takes_firing_path() {
        assert!(AlertStatus::Unknown.is_firing());
        assert!(AlertStatus::Firing.is_firing());
        assert!(!AlertStatus::Resolved.is_firing());
    }

    #[test]
    fn test_datadog_mappings() {
        assert_eq!(datadog_severity("P1"), Severity::Critical);
        assert_eq!(datadog_severity("critical"), Severity::Critical);
        assert_eq!(datadog_severity("P2"), Severity::High);
        assert_eq!(datadog_severity("P3"), Severity::Warning);
        assert_eq!(datadog_severity("P4"), Severity::Info);
        assert_eq!(datadog_severity("P9"), Severity::Warning);

        assert_eq!(datadog_status("Triggered"), AlertStatus::Firing);
        assert_eq!(datadog_status("alerting"), AlertStatus::Firing);
        assert_eq!(datadog_status("Recovered"), AlertStatus::Resolved);
        assert_eq!(datadog_status("ok"), AlertStatus::Resolved);
        assert_eq!(datadog_status("muted"), AlertStatus::Firing);
    }

    #[test]
    fn test_grafana_mappings() {
        assert_eq!(grafana_severity("alerting"), Severity::Critical);
        assert_eq!(grafana_severity("pending"), Severity::Warning);
        assert_eq!(grafana_severity("ok"), Severity::Info);
        assert_eq!(grafana_severity("paused"), Severity::Warning);

        assert_eq!(grafana_status("alerting"), AlertStatus::Firing);
        assert_eq!(grafana_status("pending"), AlertStatus::Firing);
        assert_eq!(grafana_status("ok"), AlertStatus::Resolved);
    }

    #[test]
    fn test_aws_mappings() {
        assert_eq!(aws_severity("ALARM"), Severity::Critical);
        assert_eq!(aws_severity("INSUFFICIENT_DATA"), Severity::Warning);
        assert_eq!(aws_severity("OK"), Severity::Info);

        assert_eq!(aws_status("ALARM"), AlertStatus::Firing);
        assert_eq!(aws_status("OK"), AlertStatus::Resolved);
        assert_eq!(aws_status("INSUFFICIENT_DATA"), AlertStatus::Firing);
    }
}
