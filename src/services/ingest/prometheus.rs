//! Prometheus AlertManager payload normalizer.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::incident::Severity;
use crate::domain::models::{AlertStatus, ProcessedAlert};

/// AlertManager posts `{"alerts": [...]}`; a bare alert object is accepted
/// too.
pub fn normalize(payload: &Value) -> CoreResult<Vec<ProcessedAlert>> {
    if let Some(alerts) = payload.get("alerts").and_then(Value::as_array) {
        return Ok(alerts.iter().map(parse_alert).collect());
    }
    if payload.get("labels").is_some() {
        return Ok(vec![parse_alert(payload)]);
    }
    Err(CoreError::ValidationFailed(
        "prometheus payload has no alerts array".to_string(),
    ))
}

fn parse_alert(value: &Value) -> ProcessedAlert {
    let labels = string_map(value.get("labels"));
    let annotations = string_map(value.get("annotations"));

    let alert_name = labels.get("alertname").cloned().unwrap_or_else(|| "unknown".to_string());
    let mut alert = ProcessedAlert::new(alert_name);

    alert.severity = labels
        .get("severity")
        .map(|s| Severity::from_str_or_default(s))
        .unwrap_or_default();
    alert.status = match value.get("status").and_then(Value::as_str) {
        None => AlertStatus::Firing,
        Some(s) => AlertStatus::from_str(s).unwrap_or(AlertStatus::Unknown),
    };
    alert.summary = annotations.get("summary").cloned().unwrap_or_default();
    alert.description = annotations.get("description").cloned().unwrap_or_default();
    alert.starts_at = value
        .get("startsAt")
        .and_then(Value::as_str)
        .and_then(parse_rfc3339)
        .unwrap_or_else(Utc::now);
    alert.ends_at = value.get("endsAt").and_then(Value::as_str).and_then(parse_rfc3339);
    alert.fingerprint = value
        .get("fingerprint")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string);
    alert.labels = labels;
    alert.annotations = annotations;
    alert
}

fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}

fn string_map(value: Option<&Value>) -> HashMap<String, String> {
    let mut map = HashMap::new();
    if let Some(Value::Object(obj)) = value {
        for (key, val) in obj {
            if let Some(s) = val.as_str() {
                map.insert(key.clone(), s.to_string());
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_alertmanager_batch() {
        let payload = json!({
            "alerts": [{
                "status": "firing",
                "labels": {"alertname": "HighCPU", "instance": "web-1", "severity": "critical"},
                "annotations": {"summary": "CPU>90%"},
                "startsAt": "2025-01-01T00:00:00Z",
                "fingerprint": "abc"
            }]
        });

        let alerts = normalize(&payload).unwrap();
        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.alert_name, "HighCPU");
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.status, AlertStatus::Firing);
        assert_eq!(alert.summary, "CPU>90%");
        assert_eq!(alert.fingerprint.as_deref(), Some("abc"));
        assert_eq!(alert.starts_at.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_defaults_when_fields_missing() {
        let payload = json!({"alerts": [{"labels": {}}]});
        let alerts = normalize(&payload).unwrap();
        let alert = &alerts[0];
        assert_eq!(alert.alert_name, "unknown");
        assert_eq!(alert.severity, Severity::Warning);
        assert_eq!(alert.status, AlertStatus::Firing);
        assert!(alert.fingerprint.is_none());
    }

    #[test]
    fn test_derived_fingerprint_from_labels() {
        let payload = json!({
            "alerts": [{
                "labels": {"alertname": "DiskFull", "instance": "db-2", "job": "node"}
            }]
        });
        let alerts = normalize(&payload).unwrap();
        assert_eq!(alerts[0].fingerprint(), "DiskFull-db-2-node");
    }

    #[test]
    fn test_rejects_payload_without_alerts() {
        assert!(normalize(&json!({"version": "4"})).is_err());
    }

    #[test]
    fn test_single_alert_object_accepted() {
        let payload = json!({"labels": {"alertname": "X"}, "status": "resolved"});
        let alerts = normalize(&payload).unwrap();
        assert_eq!(alerts[0].status, AlertStatus::Resolved);
    }
}
