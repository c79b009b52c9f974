//! Datadog webhook payload normalizer.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::domain::errors::{CoreError, CoreResult};
use crate::domain::models::alert::{datadog_severity, datadog_status};
use crate::domain::models::ProcessedAlert;

/// Datadog posts a single monitor transition per webhook call.
pub fn normalize(payload: &Value) -> CoreResult<Vec<ProcessedAlert>> {
    if !payload.is_object() {
        return Err(CoreError::ValidationFailed(
            "datadog payload must be a JSON object".to_string(),
        ));
    }

    let title = str_field(payload, "title").unwrap_or("datadog-alert");
    let mut alert = ProcessedAlert::new(title);

    let priority = str_field(payload, "alert_priority")
        .or_else(|| str_field(payload, "priority"))
        .unwrap_or("");
    alert.severity = datadog_severity(priority);

    let transition = str_field(payload, "transition")
        .or_else(|| str_field(payload, "alert_transition"))
        .unwrap_or("triggered");
    alert.status = datadog_status(transition);

    alert.summary = title.to_string();
    alert.description = str_field(payload, "body").unwrap_or_default().to_string();

    alert.fingerprint = str_field(payload, "aggregate")
        .or_else(|| str_field(payload, "aggreg_key"))
        .filter(|s| !s.is_empty())
        .map(ToString::to_string);

    alert.starts_at = epoch_ms_field(payload, "date")
        .or_else(|| epoch_ms_field(payload, "last_updated"))
        .unwrap_or_else(Utc::now);

    // Tags arrive as "key:value" strings.
    if let Some(tags) = payload.get("tags").and_then(Value::as_array) {
        for tag in tags.iter().filter_map(Value::as_str) {
            if let Some((key, value)) = tag.split_once(':') {
                alert.labels.insert(key.to_string(), value.to_string());
            }
        }
    }

    Ok(vec![alert])
}

fn str_field<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

fn epoch_ms_field(payload: &Value, key: &str) -> Option<DateTime<Utc>> {
    let millis = match payload.get(key) {
        Some(Value::Number(n)) => n.as_i64()?,
        Some(Value::String(s)) => s.parse::<i64>().ok()?,
        _ => return None,
    };
    Utc.timestamp_millis_opt(millis).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::incident::Severity;
    use crate::domain::models::AlertStatus;
    use serde_json::json;

    #[test]
    fn test_normalize_triggered_monitor() {
        let payload = json!({
            "title": "CPU saturated on web-1",
            "alert_priority": "P1",
            "transition": "Triggered",
            "aggregate": "dd-agg-7",
            "date": 1735689600000_i64,
            "tags": ["env:prod", "service:web"]
        });

        let alerts = normalize(&payload).unwrap();
        let alert = &alerts[0];
        assert_eq!(alert.alert_name, "CPU saturated on web-1");
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(alert.status, AlertStatus::Firing);
        assert_eq!(alert.fingerprint.as_deref(), Some("dd-agg-7"));
        assert_eq!(alert.labels.get("env").map(String::as_str), Some("prod"));
        assert_eq!(alert.starts_at.timestamp_millis(), 1_735_689_600_000);
    }

    #[test]
    fn test_recovered_maps_to_resolved() {
        let payload = json!({"title": "ok now", "transition": "Recovered", "alert_priority": "P4"});
        let alerts = normalize(&payload).unwrap();
        assert_eq!(alerts[0].status, AlertStatus::Resolved);
        assert_eq!(alerts[0].severity, Severity::Info);
    }

    #[test]
    fn test_defaults() {
        let alerts = normalize(&json!({})).unwrap();
        assert_eq!(alerts[0].alert_name, "datadog-alert");
        assert_eq!(alerts[0].severity, Severity::Warning);
        assert_eq!(alerts[0].status, AlertStatus::Firing);
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(normalize(&json!([1, 2])).is_err());
    }
}
